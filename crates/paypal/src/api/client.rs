//! PayPal REST API client
//!
//! Sends authenticated requests through the retry policy and exposes
//! paginated list endpoints as a lazy [`Pages`] sequence.
//! Uses synchronous HTTP so every call blocks the sync path until it resolves.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use url::Url;

use super::{
    FetchError, HttpRequest, HttpResponse, Method, Pages, RequestBody, RetryPolicy, TokenManager,
    Transport,
};

/// Authenticated PayPal API client
pub struct PaypalClient {
    transport: Arc<dyn Transport>,
    tokens: TokenManager,
    retry: RetryPolicy,
    base_url: Url,
    user_agent: Option<String>,
}

impl PaypalClient {
    /// Create a client for the API host at `base_url`
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: TokenManager,
        base_url: &str,
    ) -> Result<Self> {
        let mut normalized = base_url.to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;

        Ok(Self {
            transport,
            tokens,
            retry: RetryPolicy::default(),
            base_url,
            user_agent: None,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Token manager backing this client
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Obtain the first token and start background renewal
    pub fn login(&self) -> Result<(), FetchError> {
        self.tokens.login().map(|_| ())
    }

    /// Build an absolute endpoint URL with query parameters
    pub fn endpoint_url(&self, path: &str, params: &[(String, String)]) -> Result<String, FetchError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| FetchError::MalformedResponse(format!("invalid endpoint {}: {}", path, e)))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url.into())
    }

    fn build_request(&self, method: Method, url: &str, body: Option<&RequestBody>) -> HttpRequest {
        let mut request = HttpRequest::new(method, url).header("Accept", "application/json");
        // Read per attempt so a renewal between retries is picked up
        if let Some(token) = self.tokens.current_token() {
            request = request.header("Authorization", token.bearer());
        }
        if let Some(agent) = &self.user_agent {
            request = request.header("User-Agent", agent.as_str());
        }
        if let Some(body) = body {
            request = request.body(body.clone());
        }
        request
    }

    /// Send a request with retry, returning the successful response
    pub fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&RequestBody>,
    ) -> Result<HttpResponse, FetchError> {
        debug!("Making {} request to {}", method, url);
        self.retry.execute(
            url,
            || self.transport.send(&self.build_request(method, url, body)),
            || self.login(),
        )
    }

    /// Send a request with retry and parse the body as JSON
    ///
    /// An empty body parses as `Value::Null`.
    pub fn send_json(
        &self,
        method: Method,
        url: &str,
        body: Option<&RequestBody>,
    ) -> Result<Value, FetchError> {
        let response = self.send(method, url, body)?;
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body)
            .map_err(|e| FetchError::MalformedResponse(format!("invalid JSON from {}: {}", url, e)))
    }

    /// Lazily fetch pages from a list endpoint, following `next` links
    pub fn pages(&self, method: Method, url: String, body: Option<RequestBody>, data_key: &str) -> Pages<'_> {
        Pages::new(self, method, url, body, data_key, true)
    }

    /// Fetch a non-paginated endpoint as a single-page sequence
    pub fn single_page(
        &self,
        method: Method,
        url: String,
        body: Option<RequestBody>,
        data_key: &str,
    ) -> Pages<'_> {
        Pages::new(self, method, url, body, data_key, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Credentials, Page, ScriptedTransport};
    use serde_json::json;
    use std::thread;
    use std::time::{Duration, Instant};

    const BASE: &str = "https://api.test";

    fn client_with(transport: &Arc<ScriptedTransport>, renewal: Duration) -> PaypalClient {
        let tokens = TokenManager::new(
            transport.clone(),
            format!("{}/v1/oauth2/token", BASE),
            Credentials::new("id", "secret"),
            None,
        )
        .with_renewal_interval(renewal);
        PaypalClient::new(transport.clone(), tokens, BASE)
            .unwrap()
            .with_retry_policy(RetryPolicy::without_delay())
    }

    fn token(value: &str) -> Value {
        json!({"access_token": value, "token_type": "Bearer"})
    }

    fn page(n: u32, next: Option<&str>) -> Value {
        let mut links = vec![json!({"href": format!("{}/items?page={}", BASE, n), "rel": "self"})];
        if let Some(href) = next {
            links.push(json!({"href": href, "rel": "next", "method": "GET"}));
        }
        json!({"items": [{"n": n}], "links": links})
    }

    #[test]
    fn test_endpoint_url_encodes_params() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_with(&transport, Duration::from_secs(3600));
        let url = client
            .endpoint_url(
                "v1/reporting/transactions",
                &[("fields".into(), "all".into()), ("page_size".into(), "500".into())],
            )
            .unwrap();
        assert_eq!(
            url,
            "https://api.test/v1/reporting/transactions?fields=all&page_size=500"
        );
    }

    #[test]
    fn test_pagination_yields_every_page_in_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(200, page(1, Some("https://api.test/items?page=2")))
            .push_json(200, page(2, Some("https://api.test/items?page=3")))
            .push_json(200, page(3, None));
        let client = client_with(&transport, Duration::from_secs(3600));

        let pages: Vec<Page> = client
            .pages(Method::Get, format!("{}/items?page=1", BASE), None, "items")
            .collect::<Result<_, _>>()
            .unwrap();

        let ns: Vec<_> = pages.iter().map(|p| p.data[0]["n"].clone()).collect();
        assert_eq!(ns, vec![json!(1), json!(2), json!(3)]);
        let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://api.test/items?page=1",
                "https://api.test/items?page=2",
                "https://api.test/items?page=3"
            ]
        );
    }

    #[test]
    fn test_pagination_is_lazy() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(200, page(1, Some("https://api.test/items?page=2")))
            .push_json(200, page(2, None));
        let client = client_with(&transport, Duration::from_secs(3600));

        let mut pages = client.pages(Method::Get, format!("{}/items", BASE), None, "items");
        assert!(transport.requests().is_empty());
        pages.next().unwrap().unwrap();
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(pages.fetched(), 1);
    }

    #[test]
    fn test_empty_page_ends_sequence() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(200, page(1, Some("https://api.test/items?page=2")))
            .push_json(200, json!({"items": [], "links": []}));
        let client = client_with(&transport, Duration::from_secs(3600));

        let count = client
            .pages(Method::Get, format!("{}/items", BASE), None, "items")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_error_stops_iteration() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(HttpResponse::new(400, "bad request"));
        let client = client_with(&transport, Duration::from_secs(3600));

        let mut pages = client.pages(Method::Get, format!("{}/items", BASE), None, "items");
        assert!(matches!(pages.next(), Some(Err(FetchError::Client { status: 400, .. }))));
        assert!(pages.next().is_none());
    }

    #[test]
    fn test_unauthorized_triggers_login_and_retry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push(HttpResponse::new(401, "expired"))
            .push_json(200, token("fresh"))
            .push_json(200, page(1, None));
        let client = client_with(&transport, Duration::from_secs(3600));

        let pages: Vec<_> = client
            .pages(Method::Get, format!("{}/items", BASE), None, "items")
            .collect();
        assert_eq!(pages.len(), 1);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].header_value("Authorization"), None);
        assert_eq!(requests[2].header_value("Authorization"), Some("Bearer fresh"));
        client.tokens().cancel();
    }

    #[test]
    fn test_request_after_renewal_uses_new_token() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(200, token("old"))
            .push_json(200, token("new"));
        let client = client_with(&transport, Duration::from_millis(20));

        client.login().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while client.tokens().current_token().unwrap().as_str() != "new" {
            assert!(Instant::now() < deadline, "renewal never fired");
            thread::sleep(Duration::from_millis(5));
        }
        client.tokens().cancel();

        transport.push_json(200, page(1, None));
        client
            .send(Method::Get, &format!("{}/items", BASE), None)
            .unwrap();

        let last = transport.requests().pop().unwrap();
        assert_eq!(last.header_value("Authorization"), Some("Bearer new"));
    }

    #[test]
    fn test_user_agent_header() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"ok": true}));
        let client = client_with(&transport, Duration::from_secs(3600))
            .with_user_agent(Some("tap-paypal test@example.com".into()));

        client.send(Method::Get, "https://api.test/ping", None).unwrap();
        assert_eq!(
            transport.requests()[0].header_value("User-Agent"),
            Some("tap-paypal test@example.com")
        );
    }
}
