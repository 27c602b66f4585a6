//! Tap configuration
//!
//! Settings come either from a JSON file (`--config tap_config.json`) or from
//! `TAP_GORGIAS_*` environment variables (`--config ENV`).
//!
//! Example file:
//! ```json
//! {
//!   "subdomain": "acme",
//!   "username": "ops@acme.test",
//!   "password": "api-key",
//!   "start_date": "2024-01-01T00:00:00Z",
//!   "page_size": 100
//! }
//! ```
//!
//! `email_address` and `api_key` are accepted as aliases of `username` and
//! `password`.

use crate::cursor::{EPOCH, parse_datetime};
use crate::error::{Result, TapError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;
use url::Url;

/// Prefix of environment variables read by [`TapConfig::from_env`].
pub const ENV_PREFIX: &str = "TAP_GORGIAS_";

/// Largest page size the Gorgias API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

const DEFAULT_MAX_PAGES: usize = 10_000;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct TapConfig {
    /// Account subdomain, as in `<subdomain>.gorgias.com`
    pub subdomain: String,
    #[serde(alias = "email_address")]
    pub username: String,
    #[serde(alias = "api_key")]
    pub password: String,
    /// Earliest record date to sync; the epoch when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Overrides the `https://<subdomain>.gorgias.com` base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl TapConfig {
    /// Build a config with defaults for everything but the credentials.
    pub fn new(
        subdomain: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            subdomain: subdomain.into(),
            username: username.into(),
            password: password.into(),
            start_date: None,
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            api_url: None,
        }
    }

    /// Read and validate a JSON config file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TapError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    /// Parse and validate a JSON config document.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| TapError::Configuration(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the config from `TAP_GORGIAS_*` environment variables.
    ///
    /// Every setting maps to its upper-cased name, e.g. `TAP_GORGIAS_SUBDOMAIN`
    /// or `TAP_GORGIAS_START_DATE`.
    pub fn from_env() -> Result<Self> {
        let mut map = serde_json::Map::new();
        for (key, value) in std::env::vars() {
            let Some(setting) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let setting = setting.to_lowercase();
            let value = match setting.as_str() {
                "page_size" | "max_pages" | "max_retries" | "request_timeout_secs" => {
                    let number: u64 = value.trim().parse().map_err(|_| {
                        TapError::Configuration(format!("{} must be an integer, got '{}'", key, value))
                    })?;
                    json!(number)
                }
                _ => Value::String(value),
            };
            map.insert(setting, value);
        }
        log::debug!("Read {} setting(s) from {}* variables", map.len(), ENV_PREFIX);
        Self::from_json_str(&Value::Object(map).to_string())
    }

    /// Check required settings and value ranges.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.subdomain.trim().is_empty() {
            missing.push("subdomain");
        }
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        if !missing.is_empty() {
            return Err(TapError::Configuration(format!(
                "required settings are empty: {}",
                missing.join(", ")
            )));
        }

        if !self
            .subdomain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(TapError::Configuration(format!(
                "subdomain '{}' must only contain letters, digits and '-'",
                self.subdomain
            )));
        }
        if let Some(raw) = &self.start_date
            && parse_datetime(raw).is_none()
        {
            return Err(TapError::Configuration(format!(
                "start_date '{}' is not an ISO-8601 date or date-time",
                raw
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(TapError::Configuration(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.max_pages == 0 {
            return Err(TapError::Configuration("max_pages must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(TapError::Configuration(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        self.base_url()?;
        Ok(())
    }

    /// API root: `api_url` when set, else `https://<subdomain>.gorgias.com`.
    pub fn base_url(&self) -> Result<Url> {
        let raw = match &self.api_url {
            Some(url) => url.clone(),
            None => format!("https://{}.gorgias.com", self.subdomain),
        };
        Url::parse(&raw)
            .map_err(|e| TapError::Configuration(format!("invalid API URL '{}': {}", raw, e)))
    }

    /// The configured start date, or the epoch.
    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.start_date
            .as_deref()
            .and_then(parse_datetime)
            .unwrap_or(EPOCH)
    }

    /// JSON schema of the settings, as reported by `--about`.
    pub fn settings_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "subdomain": {"type": "string", "description": "Subdomain (<subdomain>.gorgias.com)"},
                "username": {"type": "string", "description": "Email address to authenticate with"},
                "password": {"type": "string", "description": "API key generated by the user", "secret": true},
                "start_date": {"type": "string", "format": "date-time", "description": "The earliest record date to sync"},
                "page_size": {"type": "integer", "default": MAX_PAGE_SIZE, "description": "The page size for each list endpoint call"},
                "max_pages": {"type": "integer", "default": DEFAULT_MAX_PAGES, "description": "Upper bound of pages fetched from one endpoint"},
                "max_retries": {"type": "integer", "default": DEFAULT_MAX_RETRIES, "description": "Retries for transient failures"},
                "request_timeout_secs": {"type": "integer", "default": DEFAULT_REQUEST_TIMEOUT_SECS, "description": "Per-request timeout"},
                "api_url": {"type": "string", "description": "Override the API base URL"}
            },
            "required": ["subdomain", "username", "password"]
        })
    }
}

impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("subdomain", &self.subdomain)
            .field("username", &self.username)
            .field("password", &"********")
            .field("start_date", &self.start_date)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("max_retries", &self.max_retries)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("api_url", &self.api_url)
            .finish()
    }
}
