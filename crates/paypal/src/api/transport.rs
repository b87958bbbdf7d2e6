//! HTTP transport abstraction
//!
//! The engine never talks to an HTTP library directly. Requests go through
//! the [`Transport`] trait so that retry, pagination and token handling can
//! be exercised against canned responses.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// HTTP method supported by the PayPal endpoints we call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }

    /// Parse a method name as it appears in a link relation
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("GET") {
            Some(Method::Get)
        } else if s.eq_ignore_ascii_case("POST") {
            Some(Method::Post)
        } else {
            None
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body variants
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `application/json`
    Json(Value),
}

/// A fully built HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a header value by name (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received HTTP response, any status
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, in seconds
    pub retry_after: Option<u64>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network-level failure: nothing usable came back
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Connection failure: {0}")]
pub struct TransportError(pub String);

/// Sends HTTP requests
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Parse a `Retry-After` header value into seconds to wait
///
/// Accepts delta-seconds and the HTTP-date form. A date in the past means
/// no wait.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some((at.with_timezone(&Utc) - now).num_seconds().max(0) as u64)
}

/// Production transport backed by a blocking `ureq` agent
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport applying `timeout` to every request
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }

    fn read_response(
        mut response: ureq::http::Response<ureq::Body>,
    ) -> Result<HttpResponse, ureq::Error> {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));
        let body = response.body_mut().read_to_string()?;
        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }

    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ureq::Error> {
        let response = match request.method {
            Method::Get => {
                let mut builder = self.agent.get(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()?
            }
            Method::Post => {
                let mut builder = self.agent.post(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match &request.body {
                    Some(RequestBody::Form(pairs)) => builder
                        .send_form(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))?,
                    Some(RequestBody::Json(value)) => builder.send_json(value)?,
                    None => builder.send_empty()?,
                }
            }
        };
        Self::read_response(response)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.execute(request)
            .map_err(|e| TransportError(e.to_string()))
    }
}

/// Transport that replays canned responses in order and records every request
///
/// Used by tests and for dry runs. Sending after the script is exhausted
/// yields a [`TransportError`].
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    pub fn push(&self, response: HttpResponse) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    /// Queue a JSON response
    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        self.push(HttpResponse::json(status, &body))
    }

    /// Queue a connection failure
    pub fn push_failure(&self, message: &str) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(TransportError(message.to_string())));
        self
    }

    /// Requests seen so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of responses still queued
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("no scripted response left".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new();
        transport
            .push(HttpResponse::new(500, ""))
            .push_json(200, json!({"ok": true}));

        let req = HttpRequest::new(Method::Get, "https://example.test/a");
        assert_eq!(transport.send(&req).unwrap().status, 500);
        assert_eq!(transport.send(&req).unwrap().status, 200);
        assert!(transport.send(&req).is_err());
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = HttpRequest::new(Method::Get, "https://example.test")
            .header("Authorization", "Bearer abc");
        assert_eq!(req.header_value("authorization"), Some("Bearer abc"));
        assert_eq!(req.header_value("User-Agent"), None);
    }

    #[test]
    fn test_parse_retry_after() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 30).unwrap();

        assert_eq!(parse_retry_after("120", now), Some(120));
        assert_eq!(parse_retry_after(" 3 ", now), Some(3));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now), Some(30));
        // Already passed
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now), Some(0));
        assert_eq!(parse_retry_after("soon", now), None);
        assert_eq!(parse_retry_after("-5", now), None);
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("get"), Some(Method::Get));
        assert_eq!(Method::parse("POST"), Some(Method::Post));
        assert_eq!(Method::parse("PATCH"), None);
    }
}
