//! Remote control server for a media player.
//!
//! Without a real playback engine attached this drives the in-memory
//! `SimulatedPlayer`, which is enough to exercise every client command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use remote_core::SimulatedPlayer;
use remote_server::auth::approver_for;
use remote_server::{ApprovalMode, Config, ControlService, LogObserver};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "remote-server")]
#[clap(about = "Control a media player over a line-based TCP protocol")]
struct Cli {
    /// TOML configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Interface to bind to
    #[clap(short, long)]
    bind: Option<String>,

    /// TCP port to listen on
    #[clap(short, long)]
    port: Option<u16>,

    /// Accept every client without approval
    #[clap(long)]
    no_auth: bool,

    /// How unknown clients are approved
    #[clap(long, value_enum)]
    approval: Option<ApprovalMode>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = load_config(&cli)?;
    info!(
        "Starting remote-server on {} (authentication {})",
        config.socket_addr_string(),
        if config.require_auth { "required" } else { "disabled" }
    );

    let approver = approver_for(config.approval);
    let service = ControlService::start(
        config,
        Box::new(SimulatedPlayer::new()),
        approver,
        Arc::new(LogObserver),
    )
    .await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("ctrl-c received");

    service.shutdown().await;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env()?;

    if let Some(bind) = &cli.bind {
        config.bind_addr = bind.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.no_auth {
        config.require_auth = false;
    }
    if let Some(approval) = cli.approval {
        config.approval = approval;
    }
    Ok(config)
}
