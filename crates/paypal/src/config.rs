//! Tap configuration
//!
//! Supports loading settings from (in order of priority):
//! 1. An explicit JSON file
//! 2. `config.json` in the tap config directory
//! 3. Environment variables (fallback)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{Credentials, LIVE_BASE_URL, SANDBOX_BASE_URL, TOKEN_PATH};
use crate::timestamp::parse_timestamp;

/// Config filename in the tap config directory
const CONFIG_FILE: &str = "config.json";

fn default_lookback() -> u32 {
    1
}

fn default_sandbox() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_token_renewal_secs() -> u64 {
    3300
}

/// Settings for one tap run
#[derive(Clone, Serialize, Deserialize)]
pub struct TapConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Bookmark used for entities never synced before
    pub start_date: String,
    /// Days re-examined before each bookmark
    #[serde(default = "default_lookback")]
    pub lookback: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Use the sandbox API host instead of the live one
    #[serde(default = "default_sandbox")]
    pub sandbox: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_token_renewal_secs")]
    pub token_renewal_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_history_days: Option<u32>,
}

impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("start_date", &self.start_date)
            .field("lookback", &self.lookback)
            .field("user_agent", &self.user_agent)
            .field("sandbox", &self.sandbox)
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("token_renewal_secs", &self.token_renewal_secs)
            .field("max_history_days", &self.max_history_days)
            .finish()
    }
}

impl TapConfig {
    /// Load config using the following priority:
    /// 1. `path`, when given
    /// 2. JSON file (~/.config/tap-paypal/config.json)
    /// 3. Environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        if config::config_exists(CONFIG_FILE) {
            let cfg: TapConfig = config::load_json(CONFIG_FILE)?;
            return cfg.validated();
        }

        Self::from_env()
    }

    /// Load config from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let cfg: TapConfig = config::load_json_file(path)?;
        cfg.validated()
    }

    /// Parse config from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: TapConfig = serde_json::from_str(json).context("Failed to parse config JSON")?;
        cfg.validated()
    }

    /// Load config from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("PAYPAL_CLIENT_ID")
            .context("PAYPAL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("PAYPAL_CLIENT_SECRET")
            .context("PAYPAL_CLIENT_SECRET environment variable not set")?;
        let start_date = std::env::var("PAYPAL_START_DATE")
            .context("PAYPAL_START_DATE environment variable not set")?;

        Self::new(client_id, client_secret, start_date).validated()
    }

    /// Config with defaults for everything but the required keys
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        start_date: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            start_date: start_date.into(),
            lookback: default_lookback(),
            user_agent: None,
            sandbox: default_sandbox(),
            base_url: None,
            token_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            token_renewal_secs: default_token_renewal_secs(),
            max_history_days: None,
        }
    }

    fn validated(self) -> Result<Self> {
        if self.client_id.trim().is_empty() {
            bail!("Config key 'client_id' is empty");
        }
        if self.client_secret.trim().is_empty() {
            bail!("Config key 'client_secret' is empty");
        }
        self.start_date_time()?;
        Ok(self)
    }

    /// Get the default config file path (~/.config/tap-paypal/config.json)
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    /// `start_date` as an absolute time
    pub fn start_date_time(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.start_date)
            .with_context(|| format!("Config key 'start_date' is not a date: {}", self.start_date))
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.client_id.clone(), self.client_secret.clone())
    }

    /// API host, honoring an explicit override
    pub fn api_base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url,
            None if self.sandbox => SANDBOX_BASE_URL,
            None => LIVE_BASE_URL,
        }
    }

    /// Token endpoint, defaulting to the token path on the API host
    pub fn token_endpoint(&self) -> String {
        match &self.token_url {
            Some(url) => url.clone(),
            None => format!("{}/{}", self.api_base_url().trim_end_matches('/'), TOKEN_PATH),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_renewal_interval(&self) -> Duration {
        Duration::from_secs(self.token_renewal_secs)
    }
}
