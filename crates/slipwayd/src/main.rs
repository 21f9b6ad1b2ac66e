//! slipwayd — the slipway daemon.
//!
//! Single binary that assembles the serving side:
//! - Container engine client
//! - Route table, restored from live containers at startup
//! - Certificate manager (self-signed or ACME)
//! - Plaintext listener (ACME challenges + HTTPS redirect)
//! - TLS listener (all proxied traffic)
//!
//! # Usage
//!
//! ```text
//! slipwayd run --config /etc/slipway/slipway.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use slipway_certs::{load_or_generate, server_config, AcmeManager, CertStore, ChallengeStore, HostPolicy};
use slipway_core::{Config, TlsMode};
use slipway_deploy::{restore_routes, run_resync};
use slipway_engine::DockerEngine;
use slipway_proxy::{serve_https, serve_redirect, ProxyHandler, ProxyOptions};
use slipway_routes::RouteTable;

#[derive(Parser)]
#[command(name = "slipwayd", about = "slipway daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the proxy and certificate manager.
    Run {
        /// Path to slipway.toml.
        #[arg(long, default_value = "/etc/slipway/slipway.toml")]
        config: PathBuf,

        /// Seconds between route resync passes against the engine.
        #[arg(long, default_value = "30")]
        resync_interval: u64,

        /// Hours between certificate renewal sweeps (ACME mode).
        #[arg(long, default_value = "12")]
        renewal_interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,slipway=debug".parse().expect("default filter")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            resync_interval,
            renewal_interval,
        } => run(config, resync_interval, renewal_interval).await,
    }
}

async fn run(config_path: PathBuf, resync_interval: u64, renewal_interval: u64) -> anyhow::Result<()> {
    info!("slipway daemon starting");

    let config = Config::from_file(&config_path)?;
    let hosts = config.hosts();
    info!(path = %config_path.display(), apps = config.apps.len(), "configuration loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Engine + routes ────────────────────────────────────────

    let engine = Arc::new(match &config.engine.socket {
        Some(socket) => DockerEngine::connect_with_socket(socket)?,
        None => DockerEngine::connect_local()?,
    });
    info!("container engine connected");

    let routes = RouteTable::new();
    let stats = restore_routes(engine.as_ref(), &config.apps, &routes).await?;
    info!(restored = stats.restored, "routes restored from engine state");

    tokio::spawn(run_resync(
        Arc::clone(&engine),
        config.apps.clone(),
        routes.clone(),
        Duration::from_secs(resync_interval),
        shutdown_rx.clone(),
    ));

    // ── Certificates ───────────────────────────────────────────

    let store = CertStore::new();
    let challenges = ChallengeStore::new();

    match config.tls.mode {
        TlsMode::SelfSigned => {
            let pair = load_or_generate(&config.tls.cert_path, &config.tls.key_path, &hosts)?;
            store.set_fallback(pair.to_certified_key()?);
            info!("self-signed certificate ready");
        }
        TlsMode::Acme => {
            let email = config
                .tls
                .acme_email
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("tls.acme_email is required in acme mode"))?;
            let manager = Arc::new(
                AcmeManager::new(
                    email,
                    config.tls.acme_directory.as_deref(),
                    config.tls.acme_cache_dir.clone(),
                    HostPolicy::new(hosts.clone()),
                    challenges.clone(),
                    store.clone(),
                )
                .await?,
            );
            let cached = manager.load_cached();
            info!(cached, "ACME certificate cache loaded");

            let issued = manager.ensure_all().await;
            info!(issued, "initial certificate sweep complete");

            tokio::spawn(Arc::clone(&manager).run_renewal(
                Duration::from_secs(renewal_interval * 3600),
                shutdown_rx.clone(),
            ));
        }
    }

    // ── Listeners ──────────────────────────────────────────────

    let handler = Arc::new(ProxyHandler::new(
        routes.clone(),
        ProxyOptions {
            compress: config.proxy.compress,
            etag: config.proxy.etag,
        },
    ));

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.proxy.http_port));
    let https_addr = SocketAddr::from(([0, 0, 0, 0], config.proxy.https_port));

    let mut redirect_task = tokio::spawn(serve_redirect(
        http_addr,
        challenges.clone(),
        config.proxy.https_port,
        shutdown_rx.clone(),
    ));
    let mut https_task = tokio::spawn(serve_https(
        https_addr,
        server_config(store),
        handler,
        shutdown_rx.clone(),
    ));

    info!("slipway daemon ready");

    // A listener dying early (bind failure, accept error) takes the
    // daemon down; otherwise run until ctrl-c.
    tokio::select! {
        result = &mut redirect_task => return result?,
        result = &mut https_task => return result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
    let _ = shutdown_tx.send(true);

    redirect_task.await??;
    https_task.await??;
    Ok(())
}
