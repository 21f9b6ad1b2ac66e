//! Error types for deployment attempts.

use thiserror::Error;

use slipway_core::ConfigError;
use slipway_engine::EngineError;

use crate::phase::DeployPhase;

/// Result type alias for deployment operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors a deployment attempt can terminate with.
///
/// Every variant carries enough context (host, phase, cause) for the
/// caller to log and alert; nothing here panics the process and nothing
/// is retried inside the orchestrator.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("network '{network}' does not exist (app '{host}')")]
    UnknownNetwork { host: String, network: String },

    #[error("a deploy is already in flight for host '{0}'")]
    AlreadyInFlight(String),

    #[error("engine failure during {phase} for '{host}': {source}")]
    Engine {
        host: String,
        phase: DeployPhase,
        #[source]
        source: EngineError,
    },

    #[error("health check timed out for '{host}' — previous version keeps serving")]
    HealthCheckTimeout { host: String },

    #[error("health check reported unhealthy for '{host}' — previous version keeps serving")]
    HealthCheckUnhealthy { host: String },

    #[error("swap left an inconsistent container state for '{host}': {detail}")]
    SwapInconsistency { host: String, detail: String },
}

impl DeployError {
    /// The host the failed attempt belonged to, when one is attached.
    pub fn host(&self) -> Option<&str> {
        match self {
            DeployError::Config(_) => None,
            DeployError::UnknownNetwork { host, .. }
            | DeployError::Engine { host, .. }
            | DeployError::HealthCheckTimeout { host }
            | DeployError::HealthCheckUnhealthy { host }
            | DeployError::SwapInconsistency { host, .. } => Some(host),
            DeployError::AlreadyInFlight(host) => Some(host),
        }
    }
}
