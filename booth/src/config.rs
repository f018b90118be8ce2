//! Client configuration parsed from environment variables.

use std::time::Duration;

use crate::transport::Role;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2_000;
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;
pub const DEFAULT_ERROR_DISPLAY_MS: u64 = 5_000;
/// The capture request stays open until the whole sequence is finished.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_QR_SIZE: u32 = 512;

const API_PREFIX: &str = "/api/v1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL (expected http:// or https://): {0}")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoothConfig {
    base_url: String,
    ws_base_url: String,
    pub reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
    pub error_display: Duration,
    pub request_timeout: Duration,
    pub qr_size: u32,
}

impl BoothConfig {
    /// Config with default timings for the given backend.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] unless the URL is `http://` or `https://`.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        let ws_base_url = ws_base(&base_url)?;
        Ok(Self {
            base_url,
            ws_base_url,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            error_display: Duration::from_millis(DEFAULT_ERROR_DISPLAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            qr_size: DEFAULT_QR_SIZE,
        })
    }

    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `BOOTH_BASE_URL`: default `http://127.0.0.1:8000`
    /// - `BOOTH_RECONNECT_DELAY_MS`: default 2000
    /// - `BOOTH_HEARTBEAT_SECS`: default 30
    /// - `BOOTH_ERROR_DISPLAY_MS`: default 5000
    /// - `BOOTH_REQUEST_TIMEOUT_SECS`: default 60
    /// - `BOOTH_QR_SIZE`: default 512
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] for a base URL that is not HTTP(S).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`BoothConfig::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] for a base URL that is not HTTP(S).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("BOOTH_BASE_URL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let parse_u64 = |key: &str, default: u64| {
            lookup(key)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        let mut config = Self::new(&base_url)?;
        config.reconnect_delay =
            Duration::from_millis(parse_u64("BOOTH_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS));
        config.heartbeat_interval =
            Duration::from_secs(parse_u64("BOOTH_HEARTBEAT_SECS", DEFAULT_HEARTBEAT_SECS).max(1));
        config.error_display =
            Duration::from_millis(parse_u64("BOOTH_ERROR_DISPLAY_MS", DEFAULT_ERROR_DISPLAY_MS));
        config.request_timeout =
            Duration::from_secs(parse_u64("BOOTH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS));
        config.qr_size = lookup("BOOTH_QR_SIZE")
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_QR_SIZE);
        Ok(config)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an `/api/v1` path such as `/sessions`.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    /// Session-scoped WebSocket endpoint for a client role.
    #[must_use]
    pub fn ws_url(&self, role: Role, session_id: &str) -> String {
        format!("{}{API_PREFIX}/ws/{}/{session_id}", self.ws_base_url, role.as_str())
    }

    /// Resolve a photo or image reference; relative paths hang off the base URL.
    #[must_use]
    pub fn resolve(&self, url_or_path: &str) -> String {
        if url_or_path.starts_with("http://") || url_or_path.starts_with("https://") {
            return url_or_path.to_owned();
        }
        if url_or_path.starts_with('/') {
            format!("{}{url_or_path}", self.base_url)
        } else {
            format!("{}/{url_or_path}", self.base_url)
        }
    }
}

fn ws_base(base_url: &str) -> Result<String, ConfigError> {
    if let Some(rest) = base_url.strip_prefix("http://") {
        if !rest.is_empty() {
            return Ok(format!("ws://{rest}"));
        }
    }
    if let Some(rest) = base_url.strip_prefix("https://") {
        if !rest.is_empty() {
            return Ok(format!("wss://{rest}"));
        }
    }

    Err(ConfigError::InvalidBaseUrl(base_url.to_owned()))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
