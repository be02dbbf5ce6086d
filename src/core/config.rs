//! Client configuration.
//!
//! Loaded from a JSON file (missing keys fall back to defaults), then
//! optionally overridden from `CARDWISE_*` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors while loading or validating a [`ClientConfig`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for this schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment override could not be parsed.
    #[error("invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    /// A setting is out of range.
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Overrides `base_url`.
pub const ENV_BASE_URL: &str = "CARDWISE_BASE_URL";
/// Overrides `use_fixtures` (`true`/`false`/`1`/`0`).
pub const ENV_USE_FIXTURES: &str = "CARDWISE_USE_FIXTURES";
/// Overrides the fixture latency, in milliseconds.
pub const ENV_FIXTURE_LATENCY_MS: &str = "CARDWISE_FIXTURE_LATENCY_MS";
/// Overrides the request timeout, in milliseconds.
pub const ENV_REQUEST_TIMEOUT_MS: &str = "CARDWISE_REQUEST_TIMEOUT_MS";
/// Overrides `max_concurrent_fetches`.
pub const ENV_MAX_CONCURRENT_FETCHES: &str = "CARDWISE_MAX_CONCURRENT_FETCHES";

/// Gateway and aggregation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root of the banking REST API; route segments are appended to it.
    pub base_url: String,
    /// Serve every operation from fixtures instead of the network.
    pub use_fixtures: bool,
    /// Simulated latency of each fixture call, in milliseconds.
    pub fixture_latency_ms: u64,
    /// Per-request transport timeout, in milliseconds.
    pub request_timeout_ms: u64,
    /// Upper bound on in-flight balance fetches per aggregation run.
    pub max_concurrent_fetches: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1/".to_string(),
            use_fixtures: true,
            fixture_latency_ms: 300,
            request_timeout_ms: 30_000,
            max_concurrent_fetches: 8,
        }
    }
}

impl ClientConfig {
    /// Read a JSON config file. Keys absent from the file keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_with(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Apply `CARDWISE_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(ENV_USE_FIXTURES) {
            self.use_fixtures = parse_bool(ENV_USE_FIXTURES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_FIXTURE_LATENCY_MS) {
            self.fixture_latency_ms = parse_num(ENV_FIXTURE_LATENCY_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            self.request_timeout_ms = parse_num(ENV_REQUEST_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_CONCURRENT_FETCHES) {
            self.max_concurrent_fetches = parse_num(ENV_MAX_CONCURRENT_FETCHES, &raw)?;
        }
        self.validate()
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_fetches",
                reason: "must be at least 1".into(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_ms",
                reason: "must be at least 1".into(),
            });
        }
        if !self.use_fixtures && self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: "required when fixtures are disabled".into(),
            });
        }
        Ok(())
    }

    /// Backend root, e.g. `https://api.example.com/api/v1`.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Start in fixture mode.
    pub fn with_fixtures(mut self, enabled: bool) -> Self {
        self.use_fixtures = enabled;
        self
    }

    /// Simulated delay of every fixture call.
    pub fn with_fixture_latency(mut self, latency: Duration) -> Self {
        self.fixture_latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Per-request timeout of the HTTP transport.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Upper bound on balance fetches in flight per aggregation run.
    pub fn with_max_concurrent_fetches(mut self, n: usize) -> Self {
        self.max_concurrent_fetches = n;
        self
    }

    /// Fixture latency as a [`Duration`].
    pub fn fixture_latency(&self) -> Duration {
        Duration::from_millis(self.fixture_latency_ms)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var,
            value: raw.to_string(),
        }),
    }
}

fn parse_num<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: raw.to_string(),
    })
}
