//! Client configuration.
//!
//! Resolved once at startup and passed into [`crate::ApiClient`], instead
//! of reading environment variables during request handling.

use std::time::Duration;

use url::Url;

/// Environment variable carrying the backend base URL.
pub const API_URL_VAR: &str = "HMC_API_URL";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How many times an idempotent GET is retried after a transport failure
/// or 5xx. Creates and updates are never retried: a retried create whose
/// first attempt actually landed would duplicate a record.
const DEFAULT_GET_RETRIES: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{API_URL_VAR} is not set")]
    MissingBaseUrl,
    #[error("invalid base URL '{value}': {source}")]
    InvalidBaseUrl {
        value: String,
        source: url::ParseError,
    },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    timeout: Duration,
    get_retries: u32,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            get_retries: DEFAULT_GET_RETRIES,
        }
    }

    /// Reads the base URL from `HMC_API_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let value = std::env::var(API_URL_VAR).map_err(|_| ConfigError::MissingBaseUrl)?;
        let base_url = Url::parse(&value).map_err(|source| ConfigError::InvalidBaseUrl {
            value,
            source,
        })?;
        Ok(Self::new(base_url))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_get_retries(mut self, retries: u32) -> Self {
        self.get_retries = retries;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get_retries(&self) -> u32 {
        self.get_retries
    }
}
