//! PayPal REST API integration
//!
//! This module provides:
//! - HTTP transport seam (production `ureq` agent and a scripted fake)
//! - OAuth2 client-credentials token management with background renewal
//! - Outcome classification and retry with exponential backoff
//! - Authenticated client with cursor-following pagination

mod auth;
mod client;
mod pagination;
mod retry;
mod transport;

pub use auth::{AccessToken, Credentials, TokenManager};
pub use client::PaypalClient;
pub use pagination::{Page, Pages, next_link};
pub use retry::{FatalKind, Outcome, RetryKind, RetryPolicy, classify};
pub use transport::{
    HttpRequest, HttpResponse, Method, RequestBody, ScriptedTransport, Transport,
    TransportError, UreqTransport, parse_retry_after,
};

/// PayPal sandbox API host
pub const SANDBOX_BASE_URL: &str = "https://api-m.sandbox.paypal.com";
/// PayPal live API host
pub const LIVE_BASE_URL: &str = "https://api-m.paypal.com";
/// Token endpoint path, relative to the API host
pub const TOKEN_PATH: &str = "v1/oauth2/token";

/// Fatal request failures surfaced to the sync runner
///
/// Transient failures (401 once, 429, 5xx, connection errors) are retried
/// inside the client and only appear here once the retry budget is spent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Credential exchange rejected
    #[error("Authentication failed (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    /// Still unauthorized after re-login
    #[error("Request unauthorized after re-authentication: {url}")]
    Unauthorized { url: String },

    /// Non-retryable 4xx response
    #[error("Client error (HTTP {status}) from {url}: {body}")]
    Client {
        status: u16,
        url: String,
        body: String,
    },

    /// Retry budget exhausted on a transient failure
    #[error("Giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: RetryKind,
    },

    /// Response body did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// PayPal API response types
pub mod types {
    use serde::Deserialize;

    /// Response from the OAuth2 token endpoint
    #[derive(Debug, Deserialize)]
    pub struct TokenResponse {
        pub access_token: String,
        #[allow(dead_code)]
        pub token_type: Option<String>,
        pub expires_in: Option<u64>,
    }

    /// HATEOAS link relation attached to paginated responses
    #[derive(Debug, Clone, PartialEq, Deserialize)]
    pub struct Link {
        pub href: String,
        pub rel: String,
        pub method: Option<String>,
    }
}
