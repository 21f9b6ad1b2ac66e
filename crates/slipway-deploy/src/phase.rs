//! Deployment phases.

use serde::{Deserialize, Serialize};

/// Phase of one deployment attempt.
///
/// ```text
/// Pulling → StoppingNext → CreatingNext → Healthchecking
///    Healthchecking --healthy--> Swapping --> Done
///    Healthchecking --unhealthy/timeout--> Rollback --> Failed
///    any phase --engine error--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployPhase {
    Pulling,
    StoppingNext,
    CreatingNext,
    Healthchecking,
    Swapping,
    Rollback,
    Done,
    Failed,
}

impl DeployPhase {
    /// Whether the attempt has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployPhase::Done | DeployPhase::Failed)
    }
}

impl std::fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeployPhase::Pulling => "pulling",
            DeployPhase::StoppingNext => "stopping-next",
            DeployPhase::CreatingNext => "creating-next",
            DeployPhase::Healthchecking => "healthchecking",
            DeployPhase::Swapping => "swapping",
            DeployPhase::Rollback => "rollback",
            DeployPhase::Done => "done",
            DeployPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}
