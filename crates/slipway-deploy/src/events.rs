//! Deployment progress events.
//!
//! The orchestrator publishes progress on a channel; rendering (CLI
//! spinners, logs, nothing at all) is the subscriber's concern and never
//! interleaves with the poll logic.

use tokio::sync::mpsc;

use crate::phase::DeployPhase;
use crate::warm::WarmReport;

/// One progress notification from a deployment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DeployEvent {
    /// The attempt entered a new phase.
    Phase { host: String, phase: DeployPhase },
    /// The candidate was rolled back.
    RolledBack { host: String, reason: String },
    /// Warmup finished against the freshly swapped backend.
    Warmed { host: String, report: WarmReport },
}

/// Optional event sink handed through the orchestrator internals.
#[derive(Clone, Default)]
pub(crate) struct Progress {
    sender: Option<mpsc::UnboundedSender<DeployEvent>>,
}

impl Progress {
    pub(crate) fn new(sender: Option<mpsc::UnboundedSender<DeployEvent>>) -> Self {
        Self { sender }
    }

    /// Emit an event; a gone subscriber is not an error.
    pub(crate) fn emit(&self, event: DeployEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    pub(crate) fn phase(&self, host: &str, phase: DeployPhase) {
        self.emit(DeployEvent::Phase {
            host: host.to_string(),
            phase,
        });
    }
}
