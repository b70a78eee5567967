//! Provider configuration.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with ORRERY_ prefix)
//! 3. .env files
//!
//! Precedence (highest to lowest): environment, file, defaults.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `ORRERY_POLL_INITIAL_MS` | `poll.initial_interval_ms` |
//! | `ORRERY_POLL_MAX_MS` | `poll.max_interval_ms` |
//! | `ORRERY_POLL_MULTIPLIER` | `poll.multiplier` |
//! | `ORRERY_DEFAULT_TIMEOUT` | `default_timeout_secs` |
//! | `ORRERY_REQUEST_TIMEOUT` | `request_timeout_secs` |
//! | `ORRERY_CREDENTIALS` | `credentials_path` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use orrery_hal::ProviderError;

use crate::poller::PollPolicy;

/// Complete provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Job status polling
    #[serde(default)]
    pub poll: PollConfig,

    /// Default bound for waiting on a job, in seconds
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Credential file location; the platform config directory when unset
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,

    /// Per-request HTTP timeout, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Poll backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_initial_interval_ms() -> u64 {
    1000
}

fn default_max_interval_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    1.5
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            default_timeout_secs: default_timeout_secs(),
            credentials_path: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        PollPolicy {
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            max_interval: Duration::from_millis(config.max_interval_ms),
            multiplier: config.multiplier,
        }
    }
}

impl ProviderConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: ProviderConfig =
            serde_yaml_ng::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration: `.env`, then the file if given, then environment
    /// overrides.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => ProviderConfig::default(),
        };
        let config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `ORRERY_*` environment variables.
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Override fields from any variable source.
    ///
    /// Values that fail to parse are ignored.
    pub fn merge_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("ORRERY_POLL_INITIAL_MS").and_then(|v| v.parse().ok()) {
            self.poll.initial_interval_ms = val;
        }
        if let Some(val) = lookup("ORRERY_POLL_MAX_MS").and_then(|v| v.parse().ok()) {
            self.poll.max_interval_ms = val;
        }
        if let Some(val) = lookup("ORRERY_POLL_MULTIPLIER").and_then(|v| v.parse().ok()) {
            self.poll.multiplier = val;
        }
        if let Some(val) = lookup("ORRERY_DEFAULT_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.default_timeout_secs = val;
        }
        if let Some(val) = lookup("ORRERY_REQUEST_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = val;
        }
        if let Some(path) = lookup("ORRERY_CREDENTIALS").filter(|v| !v.is_empty()) {
            self.credentials_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.initial_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll.initial_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.poll.max_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll.max_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.poll.max_interval_ms < self.poll.initial_interval_ms {
            return Err(ConfigError::Validation(format!(
                "poll.max_interval_ms ({}) is below poll.initial_interval_ms ({})",
                self.poll.max_interval_ms, self.poll.initial_interval_ms
            )));
        }
        if !self.poll.multiplier.is_finite() || self.poll.multiplier < 1.0 {
            return Err(ConfigError::Validation(format!(
                "poll.multiplier must be a finite number >= 1.0, got {}",
                self.poll.multiplier
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Backoff policy for job polling.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from(&self.poll)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for ProviderError {
    fn from(e: ConfigError) -> Self {
        ProviderError::Config(e.to_string())
    }
}
