//! `slipway status` — inspect live state per configured app.

use std::path::Path;
use std::sync::Arc;

use slipway_core::{names, Config};
use slipway_engine::{ContainerEngine, DockerEngine, HealthState};

pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(config_path)?;

    let engine = Arc::new(match &config.engine.socket {
        Some(socket) => DockerEngine::connect_with_socket(socket)?,
        None => DockerEngine::connect_local()?,
    });

    for app in &config.apps {
        let name = names::running(&app.host);
        match engine.inspect_container(&name).await? {
            Some(info) => {
                let state = if info.running { "running" } else { "stopped" };
                let health = match info.health {
                    HealthState::Absent => "no healthcheck",
                    HealthState::Starting => "starting",
                    HealthState::Healthy => "healthy",
                    HealthState::Unhealthy => "unhealthy",
                };
                let address = info
                    .ip_on(&app.network)
                    .map(|ip| format!("{ip}:{}", app.container_port))
                    .unwrap_or_else(|| "no address".to_string());
                println!(
                    "{host}: {state} ({health}) {address} image={image}",
                    host = app.host,
                    image = info.image,
                );
            }
            None => println!("{}: not deployed", app.host),
        }
    }
    Ok(())
}
