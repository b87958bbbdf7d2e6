//! Outcome classification and retry with exponential backoff
//!
//! Every HTTP attempt is classified into an [`Outcome`] by the pure
//! [`classify`] function. [`RetryPolicy::execute`] consumes outcomes in a
//! loop: successes return, fatal outcomes surface as [`FetchError`], and
//! retryable ones are re-attempted within the policy's budget.
//!
//! The budget is attempt-count based: `max_retries` retries after the first
//! attempt. A 401 triggers one re-login and one retry that is not counted
//! against the budget.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use super::{FetchError, HttpResponse, TransportError};

/// Transient failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// 401: token expired, re-login and retry once
    Unauthorized,
    /// 429: wait `retry_after` seconds (or the backoff delay) and retry
    RateLimited { retry_after: Option<u64> },
    /// 5xx
    ServerError { status: u16 },
    /// Network-level failure, no response
    ConnectionFailure,
}

impl fmt::Display for RetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryKind::Unauthorized => write!(f, "unauthorized"),
            RetryKind::RateLimited { .. } => write!(f, "rate limited"),
            RetryKind::ServerError { status } => write!(f, "server error (HTTP {})", status),
            RetryKind::ConnectionFailure => write!(f, "connection failure"),
        }
    }
}

/// Non-retryable failure classes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalKind {
    /// 4xx other than 401/429
    ClientError { status: u16, body: String },
    /// 1xx/3xx that the transport did not resolve
    UnexpectedStatus { status: u16, body: String },
}

impl FatalKind {
    fn into_error(self, url: &str) -> FetchError {
        match self {
            FatalKind::ClientError { status, body } | FatalKind::UnexpectedStatus { status, body } => {
                FetchError::Client {
                    status,
                    url: url.to_string(),
                    body,
                }
            }
        }
    }
}

/// Classified result of a single HTTP attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(HttpResponse),
    Retryable(RetryKind),
    Fatal(FatalKind),
}

/// Classify one attempt
pub fn classify(result: Result<HttpResponse, TransportError>) -> Outcome {
    let response = match result {
        Ok(response) => response,
        Err(_) => return Outcome::Retryable(RetryKind::ConnectionFailure),
    };

    match response.status {
        200..=299 => Outcome::Success(response),
        401 => Outcome::Retryable(RetryKind::Unauthorized),
        429 => Outcome::Retryable(RetryKind::RateLimited {
            retry_after: response.retry_after,
        }),
        500..=599 => Outcome::Retryable(RetryKind::ServerError {
            status: response.status,
        }),
        400..=499 => Outcome::Fatal(FatalKind::ClientError {
            status: response.status,
            body: response.body,
        }),
        status => Outcome::Fatal(FatalKind::UnexpectedStatus {
            status,
            body: response.body,
        }),
    }
}

type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Exponential backoff bounded by a maximum retry count
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt (401 re-login not counted)
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier applied per retry
    pub factor: f64,
    /// Upper bound for any single backoff delay
    pub max_delay: Duration,
    sleeper: Sleeper,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            factor: 2.0,
            max_delay: Duration::from_secs(120),
            sleeper: Arc::new(std::thread::sleep),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("factor", &self.factor)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl RetryPolicy {
    /// Replace the function used to wait between attempts
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Policy that never actually waits
    pub fn without_delay() -> Self {
        Self::default().with_sleeper(|_| {})
    }

    /// Backoff delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(32) as i32;
        let delay = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// How long to wait before retrying after `kind`
    fn wait_for(&self, kind: RetryKind, retry: u32) -> Duration {
        match kind {
            RetryKind::RateLimited {
                retry_after: Some(secs),
            } => Duration::from_secs(secs),
            _ => self.delay_for(retry),
        }
    }

    /// Run `send` until it succeeds, fails fatally, or the budget is spent
    ///
    /// `reauthenticate` is called synchronously on the first 401; a second
    /// 401 for the same request is fatal.
    pub fn execute<S, R>(
        &self,
        url: &str,
        mut send: S,
        mut reauthenticate: R,
    ) -> Result<HttpResponse, FetchError>
    where
        S: FnMut() -> Result<HttpResponse, TransportError>,
        R: FnMut() -> Result<(), FetchError>,
    {
        let mut retries = 0u32;
        let mut reauthenticated = false;

        loop {
            match classify(send()) {
                Outcome::Success(response) => {
                    if retries > 0 {
                        info!("Request to {} succeeded after {} retries", url, retries);
                    }
                    return Ok(response);
                }
                Outcome::Fatal(kind) => return Err(kind.into_error(url)),
                Outcome::Retryable(RetryKind::Unauthorized) => {
                    if reauthenticated {
                        return Err(FetchError::Unauthorized {
                            url: url.to_string(),
                        });
                    }
                    info!("Received unauthorized response from {}, re-authenticating", url);
                    reauthenticated = true;
                    reauthenticate()?;
                }
                Outcome::Retryable(kind) => {
                    retries += 1;
                    if retries > self.max_retries {
                        return Err(FetchError::RetriesExhausted {
                            url: url.to_string(),
                            attempts: retries,
                            last: kind,
                        });
                    }
                    let delay = self.wait_for(kind, retries);
                    warn!(
                        "Request to {} failed ({}), retry {}/{} in {:?}",
                        url, kind, retries, self.max_retries, delay
                    );
                    (self.sleeper)(delay);
                }
            }
        }
    }
}
