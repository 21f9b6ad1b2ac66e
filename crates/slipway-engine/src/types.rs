//! Engine-facing container types.

use std::collections::HashMap;
use std::time::Duration;

/// Everything needed to create one container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    /// Engine container name (`running_<host>` / `next_<host>`).
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Resolved `KEY=VALUE` environment entries.
    pub env: Vec<String>,
    /// Bind mounts as `host-path:container-path` pairs.
    pub binds: Vec<String>,
}

/// Engine-reported health of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// No health check is declared for this container.
    Absent,
    Starting,
    Healthy,
    Unhealthy,
}

/// The health check window a container declares for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthcheckWindow {
    pub interval: Duration,
    pub timeout: Duration,
    pub retries: u32,
}

impl HealthcheckWindow {
    /// Total time the engine may take before the check is conclusive.
    pub fn deadline(&self) -> Duration {
        (self.interval + self.timeout) * self.retries.max(1)
    }
}

/// Snapshot of one inspected container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
    pub health: HealthState,
    /// The container's own configured check window, if it declares one.
    pub healthcheck: Option<HealthcheckWindow>,
    /// IP address per attached network.
    pub networks: HashMap<String, String>,
}

impl ContainerInfo {
    /// IP address on the given network, if attached.
    pub fn ip_on(&self, network: &str) -> Option<&str> {
        self.networks.get(network).map(String::as_str)
    }
}

/// One entry from a container listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthcheck_deadline_scales_with_retries() {
        let window = HealthcheckWindow {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(2),
            retries: 3,
        };
        assert_eq!(window.deadline(), Duration::from_secs(21));
    }

    #[test]
    fn healthcheck_deadline_with_zero_retries() {
        let window = HealthcheckWindow {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(2),
            retries: 0,
        };
        // Treated as one attempt.
        assert_eq!(window.deadline(), Duration::from_secs(7));
    }

    #[test]
    fn ip_lookup_by_network() {
        let mut networks = HashMap::new();
        networks.insert("slipway".to_string(), "172.18.0.5".to_string());
        let info = ContainerInfo {
            id: "abc".to_string(),
            name: "running_a.example.com".to_string(),
            image: "app:1".to_string(),
            running: true,
            health: HealthState::Healthy,
            healthcheck: None,
            networks,
        };
        assert_eq!(info.ip_on("slipway"), Some("172.18.0.5"));
        assert_eq!(info.ip_on("bridge"), None);
    }
}
