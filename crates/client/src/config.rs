//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `POS_API_BASE_URL` - Base URL of the backend (default: `http://localhost:8000`)
//! - `POS_DATA_DIR` - Directory for persisted state (default: the platform
//!   data dir, e.g. `~/.local/share/tillpoint`)
//! - `POS_HTTP_TIMEOUT_SECS` - Request timeout in seconds (default: 30)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default backend origin when `POS_API_BASE_URL` is unset.
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Default request timeout in seconds.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("No data directory available; set POS_DATA_DIR")]
    NoDataDir,
}

/// Point-of-sale client configuration.
#[derive(Debug, Clone)]
pub struct PosConfig {
    /// Base URL of the backend API (paths like `/api/token/` join onto it).
    pub api_base_url: Url,
    /// Directory holding persisted state (token pair, cart snapshot).
    pub data_dir: PathBuf,
    /// Timeout applied to every outbound request.
    pub http_timeout: Duration,
}

impl PosConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a set variable fails to
    /// parse, or `ConfigError::NoDataDir` if no data directory can be
    /// determined.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = match std::env::var("POS_API_BASE_URL") {
            Ok(raw) => Url::parse(&raw).map_err(|e| {
                ConfigError::InvalidEnvVar("POS_API_BASE_URL".to_string(), e.to_string())
            })?,
            Err(_) => Url::parse(DEFAULT_API_BASE_URL)
                .map_err(|e| ConfigError::InvalidEnvVar("default".to_string(), e.to_string()))?,
        };

        let data_dir = match std::env::var("POS_DATA_DIR") {
            Ok(raw) => PathBuf::from(raw),
            Err(_) => dirs::data_dir()
                .map(|d| d.join("tillpoint"))
                .ok_or(ConfigError::NoDataDir)?,
        };

        let http_timeout = match std::env::var("POS_HTTP_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    ConfigError::InvalidEnvVar("POS_HTTP_TIMEOUT_SECS".to_string(), raw)
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            api_base_url,
            data_dir,
            http_timeout,
        })
    }

    /// Configuration pointed at an explicit base URL and data directory.
    ///
    /// Used by tests and embedders that do not read the environment.
    #[must_use]
    pub fn with_base_url(api_base_url: Url, data_dir: PathBuf) -> Self {
        Self {
            api_base_url,
            data_dir,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_url() {
        let url = Url::parse("http://127.0.0.1:9000").expect("url");
        let config = PosConfig::with_base_url(url.clone(), PathBuf::from("/tmp/till"));
        assert_eq!(config.api_base_url, url);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/till"));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }
}
