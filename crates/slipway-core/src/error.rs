//! Error types for configuration loading and validation.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating `slipway.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("duplicate host '{0}' — hosts must be unique across applications")]
    DuplicateHost(String),

    #[error("env file '{path}' could not be read: {source}")]
    EnvFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
