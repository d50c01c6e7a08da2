//! Client configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use console_observability::{LogFormat, LogFormatError};
use thiserror::Error;

use crate::storage::SqliteStore;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST base URL without a trailing slash.
    pub api_url: String,
    /// Reported to the backend in the login payload.
    pub app_version: String,
    pub request_timeout: Duration,
    /// Durable storage file; `None` means the per-user data directory.
    pub storage_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CONSOLE_API_URL is not a valid URL: {0}")]
    InvalidApiUrl(String),
    #[error("CONSOLE_REQUEST_TIMEOUT_SECS must be a positive integer, got '{0}'")]
    InvalidTimeout(String),
    #[error(transparent)]
    InvalidLogFormat(#[from] LogFormatError),
    #[error("cannot resolve storage path: {0}")]
    StoragePath(String),
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: normalize_base_url(&api_url.into()),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            storage_path: None,
            log_format: LogFormat::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("CONSOLE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        reqwest::Url::parse(&api_url).map_err(|e| ConfigError::InvalidApiUrl(e.to_string()))?;

        let mut config = Self::new(api_url);

        if let Some(version) = lookup("CONSOLE_APP_VERSION").filter(|v| !v.trim().is_empty()) {
            config.app_version = version.trim().to_string();
        }

        if let Some(raw) = lookup("CONSOLE_REQUEST_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout(raw.clone()))?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(path) = lookup("CONSOLE_STORAGE_PATH").filter(|p| !p.trim().is_empty()) {
            config.storage_path = Some(PathBuf::from(path));
        }

        if let Some(format) = lookup("CONSOLE_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }

        Ok(config)
    }

    /// Where durable client state lives.
    pub fn storage_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage_path {
            Some(path) => Ok(path.clone()),
            None => SqliteStore::default_path().map_err(|e| ConfigError::StoragePath(e.to_string())),
        }
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
