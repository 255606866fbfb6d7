//! Client configuration.
//!
//! Defaults target a local single-node cluster. `from_env` lets deployments
//! override them through `QUARRY_*` variables; timeouts are in seconds and may
//! be fractional.

use std::time::Duration;

use crate::error::ApiError;

pub const DEFAULT_URL: &str = "http://localhost:9200";
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(2);

pub const ENV_URL: &str = "QUARRY_URL";
pub const ENV_READ_TIMEOUT: &str = "QUARRY_READ_TIMEOUT";
pub const ENV_OPEN_TIMEOUT: &str = "QUARRY_OPEN_TIMEOUT";
pub const ENV_VERSION: &str = "QUARRY_VERSION";

/// Connection settings shared by a client and every client scoped from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub url: String,
    pub read_timeout: Duration,
    pub open_timeout: Duration,
    /// Server version. `None` triggers version detection at construction.
    pub version: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            version: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `QUARRY_*` environment variables.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_URL) {
            config.url = url;
        }
        if let Some(raw) = lookup(ENV_READ_TIMEOUT) {
            config.read_timeout = parse_seconds(ENV_READ_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_OPEN_TIMEOUT) {
            config.open_timeout = parse_seconds(ENV_OPEN_TIMEOUT, &raw)?;
        }
        config.version = lookup(ENV_VERSION).filter(|v| !v.trim().is_empty());
        Ok(config)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

fn parse_seconds(name: &str, raw: &str) -> Result<Duration, ApiError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(seconds)
        .ok_or_else(|| {
            ApiError::Validation(format!(
                "{name} must be a non-negative number of seconds, got {raw:?}"
            ))
        })
}

/// Convert seconds to a `Duration`, rejecting negative, non-finite and
/// out-of-range values.
pub(crate) fn seconds(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}
