//! Client configuration.
//!
//! [`ClientConfig`] can be read from TOML or from `STEADFAST_*` environment
//! variables. Every field has a default, so an empty document is valid.
//!
//! ```toml
//! base_url = "http://localhost:8080"
//! token = "token"
//! timeout_ms = 5000
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//! multiplier = 2.0
//! ```

use crate::retry::{RetryPolicy, RetryStrategy};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Connection and retry settings for the remote resource service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the remote service.
    pub base_url: String,
    /// Bearer token attached to every request.
    pub token: String,
    /// Timeout of a single attempt, in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Retry settings for operations that retry.
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: "token".to_string(),
            timeout_ms: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: usize,
    /// Delay after the first failed attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Factor applied to the delay after each further failure.
    pub multiplier: f64,
    /// Upper bound for a single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Whether to randomize delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// The retry policy these settings describe.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
            jitter: self.jitter,
        })
    }
}

impl ClientConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] on syntax errors, unknown keys or
    /// invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(text)
            .map_err(|e| Error::ConfigurationError(format!("Parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigurationError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Builds the configuration from environment variables.
    ///
    /// Reads `STEADFAST_BASE_URL`, `STEADFAST_TOKEN`, `STEADFAST_TIMEOUT_MS`,
    /// `STEADFAST_RETRY_MAX_ATTEMPTS`, `STEADFAST_RETRY_BASE_DELAY_MS`,
    /// `STEADFAST_RETRY_MULTIPLIER`, `STEADFAST_RETRY_MAX_DELAY_MS` and
    /// `STEADFAST_RETRY_JITTER`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = ClientConfig::default();

        if let Some(base_url) = lookup("STEADFAST_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(token) = lookup("STEADFAST_TOKEN") {
            config.token = token;
        }
        if let Some(value) = lookup("STEADFAST_TIMEOUT_MS") {
            config.timeout_ms = Some(parse_var("STEADFAST_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = lookup("STEADFAST_RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse_var("STEADFAST_RETRY_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("STEADFAST_RETRY_BASE_DELAY_MS") {
            config.retry.base_delay_ms = parse_var("STEADFAST_RETRY_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = lookup("STEADFAST_RETRY_MULTIPLIER") {
            config.retry.multiplier = parse_var("STEADFAST_RETRY_MULTIPLIER", &value)?;
        }
        if let Some(value) = lookup("STEADFAST_RETRY_MAX_DELAY_MS") {
            config.retry.max_delay_ms = parse_var("STEADFAST_RETRY_MAX_DELAY_MS", &value)?;
        }
        if let Some(value) = lookup("STEADFAST_RETRY_JITTER") {
            config.retry.jitter = parse_var("STEADFAST_RETRY_JITTER", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the values that parsing cannot.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::ConfigurationError("base_url is empty".to_string()));
        }
        url::Url::parse(&self.base_url)?;
        if self.retry.max_attempts == 0 {
            return Err(Error::ConfigurationError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.retry.multiplier >= 1.0) {
            return Err(Error::ConfigurationError(
                "retry.multiplier must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The per-attempt timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::ConfigurationError(format!("Invalid {}: {}", key, e)))
}
