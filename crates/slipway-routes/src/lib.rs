//! slipway-routes — the host → live backend mapping.
//!
//! The route table is the only state shared between the deployment and
//! request-serving domains. The orchestrator publishes an entry during the
//! swap phase of a successful deploy; every proxied request reads it.
//! Publication is atomic with respect to readers — a reader sees the old
//! entry or the new one, never a partial write.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

/// The live backend for one host.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RouteEntry {
    /// Backend IP address on the app network.
    pub address: String,
    /// Port the application listens on inside the container.
    pub port: u16,
}

impl RouteEntry {
    /// Full `address:port` authority string.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Shared, concurrently-read mapping from host to live backend.
///
/// Single-writer-many-reader: writes come only from the orchestrator's
/// swap phase (and the daemon's restore-on-start), reads from every
/// proxied request. Cloning shares the underlying table.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: Arc<RwLock<HashMap<String, RouteEntry>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the live backend for a host.
    pub fn lookup(&self, host: &str) -> Option<RouteEntry> {
        let routes = self.routes.read().expect("routes lock");
        routes.get(host).cloned()
    }

    /// Publish (insert or update) the live backend for a host.
    pub fn publish(&self, host: &str, entry: RouteEntry) {
        let mut routes = self.routes.write().expect("routes lock");
        debug!(%host, backend = %entry.authority(), "published route");
        routes.insert(host.to_string(), entry);
    }

    /// Remove the entry for a host.
    pub fn remove(&self, host: &str) {
        let mut routes = self.routes.write().expect("routes lock");
        routes.remove(host);
    }

    /// Snapshot of all current routes.
    pub fn snapshot(&self) -> HashMap<String, RouteEntry> {
        let routes = self.routes.read().expect("routes lock");
        routes.clone()
    }

    /// Number of routed hosts.
    pub fn len(&self) -> usize {
        let routes = self.routes.read().expect("routes lock");
        routes.len()
    }

    /// Whether no host is routed yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
