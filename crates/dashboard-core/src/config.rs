//! Client configuration.
//!
//! Values come from serde defaults, optionally a JSON file, then
//! `DASHBOARD_*` environment variables.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Dashboard client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL that relative request paths are joined to.
    pub api_base_url: String,
    /// WebSocket URL of the push backend.
    pub push_url: String,
    pub request_timeout_ms: u64,
    /// Delay before the push transport retries after a drop.
    pub reconnect_delay_ms: u64,
    /// Lifetime of a persisted token.
    pub token_ttl_secs: u64,
    /// Where the token file lives. Defaults to the platform data dir.
    pub token_path: Option<PathBuf>,
    /// Notifications kept for replay.
    pub notification_history: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://mtsbackend20-production.up.railway.app".to_string(),
            push_url: "wss://mtsbackend20-production.up.railway.app/ws".to_string(),
            request_timeout_ms: 30_000,
            reconnect_delay_ms: 2_000,
            token_ttl_secs: 24 * 60 * 60,
            token_path: None,
            notification_history: crate::notify::DEFAULT_HISTORY,
        }
    }
}

impl DashboardConfig {
    /// Load from a JSON file; missing keys fall back to defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply `DASHBOARD_*` overrides from the process environment.
    ///
    /// # Errors
    /// Returns error if a numeric override does not parse.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// # Errors
    /// Returns error if a numeric override does not parse.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup("DASHBOARD_API_URL") {
            self.api_base_url = url;
        }
        if let Some(url) = lookup("DASHBOARD_PUSH_URL") {
            self.push_url = url;
        }
        if let Some(path) = lookup("DASHBOARD_TOKEN_PATH") {
            self.token_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("DASHBOARD_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_number("DASHBOARD_REQUEST_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("DASHBOARD_RECONNECT_DELAY_MS") {
            self.reconnect_delay_ms = parse_number("DASHBOARD_RECONNECT_DELAY_MS", &raw)?;
        }
        Ok(self)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Token file location, falling back to `<data dir>/mts-dashboard/session.json`.
    #[cfg(feature = "file-storage")]
    #[must_use]
    pub fn resolved_token_path(&self) -> PathBuf {
        self.token_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mts-dashboard")
                .join("session.json")
        })
    }

    /// Resolve a request address: absolute URLs pass through, paths join the base URL.
    #[must_use]
    pub fn resolve_url(&self, address: &str) -> String {
        if address.starts_with("http://") || address.starts_with("https://") {
            return address.to_string();
        }
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            address.trim_start_matches('/')
        )
    }
}

fn parse_number(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
