//! slipway-deploy — the blue-green deployment orchestrator.
//!
//! One [`Deployer`] drives the per-host state machine: pull, replace any
//! stale candidate, create and start the new container, gate on its health
//! check, then swap it into the live slot and publish its address to the
//! route table. The previous version keeps serving until the instant of
//! the swap; an unhealthy candidate is rolled back without touching the
//! live container or its route.

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod phase;
pub mod prober;
pub mod restore;
pub mod warm;

#[cfg(test)]
pub(crate) mod fake;

pub use error::{DeployError, DeployResult};
pub use events::DeployEvent;
pub use orchestrator::{ContainerHandle, DeployOptions, DeployOutcome, Deployer, Role};
pub use phase::DeployPhase;
pub use prober::ProbeOutcome;
pub use restore::{restore_routes, run_resync, RestoreStats};
pub use warm::WarmReport;
