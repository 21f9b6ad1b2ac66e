use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "slipway",
    about = "slipway — blue-green container deploys behind a TLS proxy",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy one configured app, or all of them.
    ///
    /// Each app gets a full blue-green cycle: pull, start the candidate,
    /// health-check, swap. A failed host does not stop the rest.
    Deploy {
        /// Path to slipway.toml.
        #[arg(short, long, default_value = "slipway.toml")]
        config: PathBuf,
        /// Deploy only this host.
        #[arg(long)]
        host: Option<String>,
        /// Skip the image pull.
        #[arg(long)]
        no_pull: bool,
        /// Treat the candidate as healthy without polling.
        #[arg(long)]
        skip_healthchecks: bool,
    },
    /// Show container and route state for every configured app.
    Status {
        /// Path to slipway.toml.
        #[arg(short, long, default_value = "slipway.toml")]
        config: PathBuf,
    },
    /// Write a starter slipway.toml.
    Init {
        #[arg(default_value = "slipway.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".parse().expect("default filter")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy {
            config,
            host,
            no_pull,
            skip_healthchecks,
        } => commands::deploy::run(&config, host.as_deref(), no_pull, skip_healthchecks).await,
        Commands::Status { config } => commands::status::run(&config).await,
        Commands::Init { path } => commands::init::run(&path),
    }
}
