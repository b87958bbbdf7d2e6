//! PayPal OAuth2 client-credentials authentication
//!
//! Exchanges the client id/secret for a bearer token and keeps it fresh with
//! a background renewal timer. The timer fires on a fixed interval chosen
//! to be shorter than PayPal's token lifetime; server-provided expiry is
//! logged but not used for scheduling.

use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use base64::prelude::*;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::types::TokenResponse;
use super::{FetchError, HttpRequest, Method, RequestBody, RetryKind, Transport};

/// OAuth2 client credentials
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", BASE64_STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Bearer token plus the time it was issued
#[derive(Clone, PartialEq)]
pub struct AccessToken {
    value: String,
    issued_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            issued_at,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// State shared between request paths and the renewal thread
struct TokenState {
    transport: Arc<dyn Transport>,
    token_url: String,
    credentials: Credentials,
    user_agent: Option<String>,
    token: RwLock<Option<AccessToken>>,
}

impl TokenState {
    /// Perform the credential exchange and swap in the new token
    fn exchange(&self) -> Result<AccessToken, FetchError> {
        let mut request = HttpRequest::new(Method::Post, &self.token_url)
            .header("Accept", "application/json")
            .header("Accept-Language", "en_US")
            .header("Authorization", self.credentials.basic_auth())
            .body(RequestBody::Form(vec![(
                "grant_type".to_string(),
                "client_credentials".to_string(),
            )]));
        if let Some(agent) = &self.user_agent {
            request = request.header("User-Agent", agent.as_str());
        }

        let response = self.transport.send(&request).map_err(|e| {
            warn!("Token request failed: {}", e);
            FetchError::RetriesExhausted {
                url: self.token_url.clone(),
                attempts: 1,
                last: RetryKind::ConnectionFailure,
            }
        })?;

        if !response.is_success() {
            return Err(FetchError::Auth {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| FetchError::MalformedResponse(format!("token response: {}", e)))?;
        if let Some(expires_in) = parsed.expires_in {
            debug!("Token issued, server reports expiry in {}s", expires_in);
        }

        let token = AccessToken::new(parsed.access_token, Utc::now());
        *self.token.write().unwrap() = Some(token.clone());
        Ok(token)
    }
}

/// Handle to the running renewal thread
struct Renewal {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the access token and its background renewal
///
/// Readers call [`TokenManager::current_token`] and always observe a whole
/// token, either the previous or the renewed one. Call
/// [`TokenManager::cancel`] (or drop the manager) on shutdown to stop the
/// timer.
pub struct TokenManager {
    state: Arc<TokenState>,
    renewal_interval: Duration,
    renewal: Mutex<Option<Renewal>>,
}

impl TokenManager {
    /// Default renewal interval, under PayPal's ~3600s token lifetime
    pub const DEFAULT_RENEWAL_INTERVAL: Duration = Duration::from_secs(3300);

    /// `user_agent` is sent on every token request when set
    pub fn new(
        transport: Arc<dyn Transport>,
        token_url: impl Into<String>,
        credentials: Credentials,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            state: Arc::new(TokenState {
                transport,
                token_url: token_url.into(),
                credentials,
                user_agent,
                token: RwLock::new(None),
            }),
            renewal_interval: Self::DEFAULT_RENEWAL_INTERVAL,
            renewal: Mutex::new(None),
        }
    }

    /// Set the fixed renewal interval (must be called before the first login)
    pub fn with_renewal_interval(mut self, interval: Duration) -> Self {
        self.renewal_interval = interval;
        self
    }

    /// Exchange credentials for a new token
    ///
    /// On success the first call also starts the renewal timer.
    ///
    /// # Errors
    /// Returns [`FetchError::Auth`] if the token endpoint answers non-2xx.
    pub fn login(&self) -> Result<AccessToken, FetchError> {
        info!("Refreshing access token");
        let token = self.state.exchange()?;
        self.schedule_renewal();
        Ok(token)
    }

    /// Latest token, if a login has succeeded
    pub fn current_token(&self) -> Option<AccessToken> {
        self.state.token.read().unwrap().clone()
    }

    /// Whether the renewal timer is running
    pub fn is_renewing(&self) -> bool {
        self.renewal.lock().unwrap().is_some()
    }

    /// Stop the renewal timer and wait for it to exit
    pub fn cancel(&self) {
        let renewal = self.renewal.lock().unwrap().take();
        if let Some(renewal) = renewal {
            // Dropping the sender also wakes the thread; send is best effort
            let _ = renewal.stop.send(());
            drop(renewal.stop);
            if renewal.handle.join().is_err() {
                warn!("Token renewal thread panicked");
            }
            debug!("Token renewal cancelled");
        }
    }

    fn schedule_renewal(&self) {
        let mut guard = self.renewal.lock().unwrap();
        if guard.is_some() {
            return;
        }

        let state = Arc::clone(&self.state);
        let interval = self.renewal_interval;
        let (stop, stop_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => match state.exchange() {
                        Ok(_) => info!("Renewed access token"),
                        Err(e) => warn!("Scheduled token renewal failed: {}", e),
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        *guard = Some(Renewal { stop, handle });
    }
}

impl Drop for TokenManager {
    fn drop(&mut self) {
        self.cancel();
    }
}
