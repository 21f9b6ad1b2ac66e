//! Error types for container engine operations.

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the container engine client.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine connection failed: {0}")]
    Connection(String),

    #[error("container '{0}' not found")]
    NotFound(String),

    #[error("network '{0}' not found")]
    NetworkNotFound(String),

    #[error("image pull failed for '{image}': {reason}")]
    Pull { image: String, reason: String },

    #[error("invalid container spec: {0}")]
    InvalidSpec(String),

    #[error("engine API error: {0}")]
    Api(String),
}
