//! Route restore — rebuilds the route table from live engine state.
//!
//! A restarted daemon must know the authoritative backend for every host
//! before the first deploy runs. Restore inspects each app's
//! `running_<host>` container and publishes its address; a periodic resync
//! keeps the table aligned with deploys driven from other processes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use slipway_core::{names, Application};
use slipway_engine::{ContainerEngine, EngineError};
use slipway_routes::{RouteEntry, RouteTable};

/// Counters from one restore pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RestoreStats {
    /// Hosts whose route was published.
    pub restored: u32,
    /// Hosts with no live container (route removed if present).
    pub unrouted: u32,
}

/// One full pass: publish a route per live `running_<host>` container,
/// remove the route for hosts whose container is gone or stopped.
pub async fn restore_routes<E: ContainerEngine>(
    engine: &E,
    apps: &[Application],
    routes: &RouteTable,
) -> Result<RestoreStats, EngineError> {
    let mut stats = RestoreStats::default();

    for app in apps {
        let name = names::running(&app.host);
        let live = match engine.inspect_container(&name).await? {
            Some(info) if info.running => info.ip_on(&app.network).map(str::to_owned),
            _ => None,
        };

        match live {
            Some(address) => {
                routes.publish(
                    &app.host,
                    RouteEntry {
                        address,
                        port: app.container_port,
                    },
                );
                stats.restored += 1;
            }
            None => {
                debug!(host = %app.host, "no live container, leaving host unrouted");
                routes.remove(&app.host);
                stats.unrouted += 1;
            }
        }
    }

    // Surface live containers that no configured app claims; they keep
    // running but receive no traffic.
    for summary in engine.list_containers("running_").await? {
        if let Some(host) = names::host_of_running(&summary.name) {
            if summary.running && !apps.iter().any(|a| a.host == host) {
                warn!(%host, container = %summary.name, "live container has no configured app");
            }
        }
    }

    info!(
        restored = stats.restored,
        unrouted = stats.unrouted,
        "route restore complete"
    );
    Ok(stats)
}

/// Periodic resync loop for the daemon. Runs until the shutdown signal.
pub async fn run_resync<E: ContainerEngine>(
    engine: Arc<E>,
    apps: Vec<Application>,
    routes: RouteTable,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if let Err(e) = restore_routes(engine.as_ref(), &apps, &routes).await {
                    tracing::warn!(error = %e, "route resync failed");
                }
            }
            _ = shutdown.changed() => {
                info!("route resync shutting down");
                break;
            }
        }
    }
}
