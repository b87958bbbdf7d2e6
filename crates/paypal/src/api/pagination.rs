//! Cursor-following pagination over PayPal list endpoints
//!
//! PayPal list responses carry a `links` array of `{href, rel, method}`.
//! [`Pages`] lazily follows the `rel == "next"` entry until it disappears or
//! a page comes back empty. The sequence cannot be resumed part way through:
//! a caller that loses its place must re-issue the original request.

use log::{debug, warn};
use serde_json::{Map, Value};

use super::types::Link;
use super::{FetchError, Method, PaypalClient, RequestBody};

/// Key holding link relations in a response envelope
pub const LINKS_KEY: &str = "links";

/// One page of a list response
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Response body minus the data array and links
    pub envelope: Map<String, Value>,
    /// Items under the data key
    pub data: Vec<Value>,
    /// Link to the following page, if any
    pub next: Option<Link>,
}

impl Page {
    /// Split a response body into envelope, data and next link
    ///
    /// Returns `Ok(None)` for an empty body or an empty data array, both of
    /// which end pagination. A non-empty body without `data_key` is
    /// malformed.
    pub fn parse(body: Value, data_key: &str) -> Result<Option<Page>, FetchError> {
        let mut envelope = match body {
            Value::Null => return Ok(None),
            Value::Object(map) if map.is_empty() => return Ok(None),
            Value::Object(map) => map,
            other => {
                return Err(FetchError::MalformedResponse(format!(
                    "expected JSON object, got {}",
                    type_name(&other)
                )));
            }
        };

        let data = match envelope.remove(data_key) {
            None => {
                return Err(FetchError::MalformedResponse(format!(
                    "response is missing '{}'",
                    data_key
                )));
            }
            Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(Value::Object(item)) => vec![Value::Object(item)],
            Some(other) => {
                return Err(FetchError::MalformedResponse(format!(
                    "'{}' is {}, expected array or object",
                    data_key,
                    type_name(&other)
                )));
            }
        };

        if data.is_empty() {
            return Ok(None);
        }

        let next = next_link(&envelope);
        envelope.remove(LINKS_KEY);

        Ok(Some(Page {
            envelope,
            data,
            next,
        }))
    }
}

/// Find the `rel == "next"` link in a response envelope
pub fn next_link(envelope: &Map<String, Value>) -> Option<Link> {
    envelope
        .get(LINKS_KEY)?
        .as_array()?
        .iter()
        .filter_map(|v| serde_json::from_value::<Link>(v.clone()).ok())
        .find(|link| link.rel == "next")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Request to issue for the next page
#[derive(Debug, Clone)]
struct PendingRequest {
    method: Method,
    url: String,
    body: Option<RequestBody>,
}

/// Lazy, finite sequence of pages
///
/// Yields `Err` at most once; iteration stops after an error.
pub struct Pages<'a> {
    client: &'a PaypalClient,
    data_key: String,
    follow_links: bool,
    original_body: Option<RequestBody>,
    pending: Option<PendingRequest>,
    fetched: usize,
}

impl<'a> Pages<'a> {
    pub(crate) fn new(
        client: &'a PaypalClient,
        method: Method,
        url: String,
        body: Option<RequestBody>,
        data_key: &str,
        follow_links: bool,
    ) -> Self {
        Self {
            client,
            data_key: data_key.to_string(),
            follow_links,
            original_body: body.clone(),
            pending: Some(PendingRequest { method, url, body }),
            fetched: 0,
        }
    }

    /// Number of pages fetched so far
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    fn follow(&self, current_url: &str, link: &Link) -> Option<PendingRequest> {
        if link.href == current_url {
            warn!("Next link points at the current page ({}), stopping", current_url);
            return None;
        }
        let method = link
            .method
            .as_deref()
            .and_then(Method::parse)
            .unwrap_or(Method::Get);
        let body = match method {
            Method::Get => None,
            Method::Post => self.original_body.clone(),
        };
        Some(PendingRequest {
            method,
            url: link.href.clone(),
            body,
        })
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<Page, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let request = self.pending.take()?;
        debug!("Fetching page {} from {}", self.fetched + 1, request.url);

        let body = match self
            .client
            .send_json(request.method, &request.url, request.body.as_ref())
        {
            Ok(body) => body,
            Err(e) => return Some(Err(e)),
        };

        match Page::parse(body, &self.data_key) {
            Ok(Some(page)) => {
                self.fetched += 1;
                if self.follow_links {
                    self.pending = page
                        .next
                        .as_ref()
                        .and_then(|link| self.follow(&request.url, link));
                }
                Some(Ok(page))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_extracts_next_link() {
        let body = json!({
            "transaction_details": [{"a": 1}, {"a": 2}],
            "account_number": "ACC",
            "links": [
                {"href": "https://api.test/p1", "rel": "self", "method": "GET"},
                {"href": "https://api.test/p2", "rel": "next", "method": "GET"}
            ]
        });

        let page = Page::parse(body, "transaction_details").unwrap().unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.next.unwrap().href, "https://api.test/p2");
        assert_eq!(page.envelope.get("account_number"), Some(&json!("ACC")));
        assert!(page.envelope.get("links").is_none());
    }

    #[test]
    fn test_parse_without_next_link() {
        let body = json!({"items": [{"a": 1}], "links": [{"href": "x", "rel": "self"}]});
        let page = Page::parse(body, "items").unwrap().unwrap();
        assert!(page.next.is_none());
    }

    #[test]
    fn test_parse_empty_ends_pagination() {
        assert_eq!(Page::parse(Value::Null, "items").unwrap(), None);
        assert_eq!(Page::parse(json!({}), "items").unwrap(), None);
        assert_eq!(Page::parse(json!({"items": []}), "items").unwrap(), None);
    }

    #[test]
    fn test_parse_missing_data_key_is_malformed() {
        let err = Page::parse(json!({"other": []}), "items").unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_single_object_payload() {
        let page = Page::parse(json!({"balance": {"currency": "USD"}}), "balance")
            .unwrap()
            .unwrap();
        assert_eq!(page.data, vec![json!({"currency": "USD"})]);
    }
}
