//! Runtime configuration
//!
//! Loaded from `config.toml` in the platform config directory, with a few
//! environment variable overrides applied on top:
//! - `API_REST_URL` - base endpoint
//! - `API_REST_URL_MOBILE` - alternate endpoint used when `is_mobile` is set
//! - `API_REST_IS_MOBILE` - `true`/`1` to route through the mobile endpoint

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ApiRestError, Result};

/// Transport-level retry behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// How many times a failed request may be re-sent
    #[serde(default = "default_retries")]
    pub retries: u8,

    /// Status codes that make a request eligible for a re-send
    #[serde(default = "default_retry_status_codes")]
    pub retry_status_codes: Vec<u16>,

    /// Re-send the original request after its 401 led to a successful refresh.
    /// When off, the caller gets `ApiRestError::Refreshed` and decides itself.
    #[serde(default)]
    pub replay_after_refresh: bool,
}

fn default_retries() -> u8 {
    1
}

fn default_retry_status_codes() -> Vec<u16> {
    vec![StatusCode::UNAUTHORIZED.as_u16()]
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_status_codes: default_retry_status_codes(),
            replay_after_refresh: false,
        }
    }
}

impl RetryPolicy {
    /// Whether a response with this status may be re-sent
    pub fn retries_on(&self, status: StatusCode) -> bool {
        self.retry_status_codes.contains(&status.as_u16())
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Base endpoint; a relative value is resolved against `origin`
    #[serde(default = "default_rest_api_url")]
    pub rest_api_url: String,

    /// Alternate endpoint for mobile builds
    #[serde(default = "default_rest_api_url_mobile")]
    pub rest_api_url_mobile: String,

    /// Route requests through `rest_api_url_mobile`
    #[serde(default)]
    pub is_mobile: bool,

    /// Origin used to resolve a relative `rest_api_url`
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Header carrying the raw token
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    /// Relative path of the refresh endpoint
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Optional per-request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_rest_api_url() -> String {
    "/".to_string()
}

fn default_rest_api_url_mobile() -> String {
    "https://mobile.app/".to_string()
}

fn default_origin() -> String {
    "http://localhost/".to_string()
}

fn default_auth_header() -> String {
    "x-authorization".to_string()
}

fn default_refresh_path() -> String {
    "/api/auth/refresh".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            rest_api_url: default_rest_api_url(),
            rest_api_url_mobile: default_rest_api_url_mobile(),
            is_mobile: false,
            origin: default_origin(),
            auth_header: default_auth_header(),
            refresh_path: default_refresh_path(),
            timeout_secs: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the default file, or defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: RuntimeConfig = toml::from_str(&contents)?;
            tracing::debug!(path = %path.display(), "loaded configuration");
            Ok(config)
        } else {
            Ok(RuntimeConfig::default())
        }
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "api-rest", "api-rest")
            .ok_or_else(|| ApiRestError::Config("Could not determine config directory".into()))?;

        Ok(project_dirs.config_dir().join("config.toml"))
    }

    /// Apply `API_REST_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("API_REST_URL").filter(|v| !v.is_empty()) {
            self.rest_api_url = url;
        }
        if let Some(url) = lookup("API_REST_URL_MOBILE").filter(|v| !v.is_empty()) {
            self.rest_api_url_mobile = url;
        }
        if let Some(flag) = lookup("API_REST_IS_MOBILE") {
            self.is_mobile = matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Endpoint requests are sent to, after platform routing
    pub fn endpoint(&self) -> &str {
        if self.is_mobile {
            &self.rest_api_url_mobile
        } else {
            &self.rest_api_url
        }
    }

    /// Absolute base URL, always ending in `/` so relative targets join under it
    pub fn base_url(&self) -> Result<Url> {
        let endpoint = self.endpoint();
        let mut url = match Url::parse(endpoint) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&self.origin)?.join(endpoint)?,
            Err(e) => return Err(e.into()),
        };

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// Request timeout, if configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
