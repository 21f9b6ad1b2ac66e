//! Container naming scheme.
//!
//! Exactly two container names exist per host during normal operation:
//! `running_<host>` (the live instance) and `next_<host>` (the candidate
//! being health-checked). `retired_<host>` appears only transiently while
//! a swap promotes the candidate.

/// Name of the live container for a host.
pub fn running(host: &str) -> String {
    format!("running_{host}")
}

/// Name of the candidate container for a host.
pub fn next(host: &str) -> String {
    format!("next_{host}")
}

/// Transient name the outgoing container holds during a swap.
pub fn retired(host: &str) -> String {
    format!("retired_{host}")
}

/// Recover the host from a `running_<host>` container name, if it is one.
pub fn host_of_running(name: &str) -> Option<&str> {
    name.strip_prefix("running_")
}
