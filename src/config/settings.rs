//! Client tunables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Result};

/// Settings for a Jira client.
///
/// Everything here has a sane default. A TOML file can override any of it:
///
/// ```toml
/// [jira]
/// url = "https://company.atlassian.net"
/// user = "me@company.com"
///
/// [retry]
/// max_retries = 5
/// initial_retry_delay = 0.5
/// max_retry_delay = 30.0
///
/// [transport]
/// connect_timeout = 10.0
/// ```
///
/// The API token is never read from the file. Raw-response mode is chosen in
/// code with [`ClientBuilder::raw_response`](crate::ClientBuilder::raw_response)
/// because it changes what every operation returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection details.
    pub jira: JiraSettings,
    /// Rate-limit retry behaviour.
    pub retry: RetrySettings,
    /// Low-level HTTP behaviour.
    pub transport: TransportSettings,
}

/// Connection details that may live in a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraSettings {
    /// The Jira instance URL.
    pub url: Option<String>,
    /// The user's email address.
    pub user: Option<String>,
}

/// Retry settings for rate-limited (429) responses. Delays are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// How many times a rate-limited request is retried.
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub initial_retry_delay: f64,
    /// Upper bound for the exponential backoff.
    pub max_retry_delay: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay: 1.0,
            max_retry_delay: 60.0,
        }
    }
}

/// Transport settings. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// TCP connect timeout.
    pub connect_timeout: f64,
    /// Whole-request timeout.
    pub request_timeout: f64,
    /// Backoff factor for server-error retries (`factor * 2^n`).
    pub server_error_backoff: f64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: 10.0,
            request_timeout: 30.0,
            server_error_backoff: 0.3,
        }
    }
}

impl TransportSettings {
    pub(crate) fn connect_timeout(&self) -> Duration {
        seconds(self.connect_timeout)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        seconds(self.request_timeout)
    }

    pub(crate) fn server_error_backoff(&self) -> Duration {
        seconds(self.server_error_backoff)
    }
}

/// Convert seconds to a `Duration`, saturating instead of panicking.
///
/// Negative and NaN values become zero; anything too large for a
/// `Duration` becomes `Duration::MAX`.
pub(crate) fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

impl ClientConfig {
    /// The default config file location.
    ///
    /// `<config dir>/jira-gateway/config.toml`, e.g.
    /// `~/.config/jira-gateway/config.toml` on Linux.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("jira-gateway").join("config.toml"))
    }

    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading client config");

        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml_str(&contents)
    }

    /// Load the config at [`ClientConfig::default_path`], or defaults when no
    /// file exists there.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the numeric settings make sense.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: f64| {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a positive number of seconds, got {}",
                    name, value
                )));
            }
            representable(name, value)
        };

        positive("initial_retry_delay", self.retry.initial_retry_delay)?;
        positive("max_retry_delay", self.retry.max_retry_delay)?;
        positive("connect_timeout", self.transport.connect_timeout)?;
        positive("request_timeout", self.transport.request_timeout)?;

        if self.retry.max_retry_delay < self.retry.initial_retry_delay {
            return Err(ConfigError::ValidationError(format!(
                "max_retry_delay ({}) must not be smaller than initial_retry_delay ({})",
                self.retry.max_retry_delay, self.retry.initial_retry_delay
            )));
        }

        if !self.transport.server_error_backoff.is_finite()
            || self.transport.server_error_backoff < 0.0
        {
            return Err(ConfigError::ValidationError(format!(
                "server_error_backoff must not be negative, got {}",
                self.transport.server_error_backoff
            )));
        }
        representable("server_error_backoff", self.transport.server_error_backoff)?;

        Ok(())
    }
}

fn representable(name: &str, value: f64) -> Result<()> {
    Duration::try_from_secs_f64(value).map(|_| ()).map_err(|_| {
        ConfigError::ValidationError(format!("{} is too large: {} seconds", name, value))
    })
}
