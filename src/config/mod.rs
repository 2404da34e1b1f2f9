//! Configuration for the Jira gateway.
//!
//! Credentials are resolved once, when a client is built, from explicit
//! values with an environment fallback. Tunables come from code or from an
//! optional TOML file.

mod credentials;
mod settings;

use thiserror::Error;

pub use credentials::{CredentialInput, Credentials, ENV_TOKEN, ENV_URL, ENV_USER};
pub use settings::{ClientConfig, JiraSettings, RetrySettings, TransportSettings};
pub(crate) use settings::seconds;

/// Errors that can occur while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform has no configuration directory.
    #[error("could not determine configuration directory")]
    NoConfigDir,

    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    ReadError(#[source] std::io::Error),

    /// The config file is not valid TOML or has the wrong shape.
    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A setting has an unusable value.
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
