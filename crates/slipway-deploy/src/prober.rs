//! Health prober.
//!
//! Re-inspects a container at a fixed cadence until the engine reports a
//! terminal health status or the deadline elapses. Never mutates container
//! state. A container without a declared health check resolves immediately
//! to healthy.

use std::time::Duration;

use tracing::debug;

use slipway_engine::{ContainerEngine, EngineError, HealthState};

/// Outcome of polling one container to a conclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    Unhealthy,
    TimedOut,
}

/// Inspection cadence while the health status is still `starting`.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Poll a container's engine-reported health until it is conclusive.
pub async fn poll<E: ContainerEngine>(
    engine: &E,
    name: &str,
    deadline: Duration,
) -> Result<ProbeOutcome, EngineError> {
    let started = tokio::time::Instant::now();
    loop {
        let info = engine
            .inspect_container(name)
            .await?
            .ok_or_else(|| EngineError::NotFound(name.to_string()))?;

        match info.health {
            HealthState::Absent | HealthState::Healthy => return Ok(ProbeOutcome::Healthy),
            HealthState::Unhealthy => return Ok(ProbeOutcome::Unhealthy),
            HealthState::Starting => {}
        }

        if started.elapsed() >= deadline {
            debug!(container = name, ?deadline, "health poll deadline elapsed");
            return Ok(ProbeOutcome::TimedOut);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
