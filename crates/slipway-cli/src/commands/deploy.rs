//! `slipway deploy` — run blue-green deploys from the terminal.
//!
//! Rendering subscribes to the deployer's progress events; the
//! orchestrator never touches the terminal itself.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::mpsc;

use slipway_core::{Application, Config};
use slipway_deploy::{DeployEvent, DeployOptions, Deployer};
use slipway_engine::DockerEngine;
use slipway_routes::RouteTable;

pub async fn run(
    config_path: &Path,
    host: Option<&str>,
    no_pull: bool,
    skip_healthchecks: bool,
) -> anyhow::Result<()> {
    let config = Config::from_file(config_path)?;

    let apps: Vec<Application> = match host {
        Some(host) => vec![config
            .app(host)
            .with_context(|| format!("no app configured for host '{host}'"))?
            .clone()],
        None => config.apps.clone(),
    };
    if apps.is_empty() {
        bail!("no apps configured in {}", config_path.display());
    }

    let engine = Arc::new(match &config.engine.socket {
        Some(socket) => DockerEngine::connect_with_socket(socket)?,
        None => DockerEngine::connect_local()?,
    });
    let deployer = Deployer::new(engine, RouteTable::new());

    let opts = DeployOptions {
        pull: !no_pull,
        run_healthchecks: !skip_healthchecks,
    };

    // A failed host never aborts the run; remaining hosts still deploy.
    let mut failed = 0usize;
    for app in &apps {
        let (tx, rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(render_progress(rx));

        match deployer.deploy_with_progress(app, opts, Some(tx)).await {
            Ok(outcome) => {
                println!("{}: live at {}", outcome.host, outcome.route.authority());
            }
            Err(e) => {
                eprintln!("{}: deploy failed: {e}", app.host);
                failed += 1;
            }
        }
        let _ = printer.await;
    }

    if failed > 0 {
        bail!("{failed} of {} deploys failed", apps.len());
    }
    Ok(())
}

async fn render_progress(mut events: mpsc::UnboundedReceiver<DeployEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            DeployEvent::Phase { host, phase } => println!("{host}: {phase}"),
            DeployEvent::RolledBack { host, reason } => {
                println!("{host}: rolled back ({reason})");
            }
            DeployEvent::Warmed { host, report } => {
                println!(
                    "{host}: warmed {} requests (min {:?} / avg {:?} / max {:?})",
                    report.requests, report.min, report.avg, report.max
                );
            }
        }
    }
}
