//! # MTB Daemon
//!
//! Entry point: parse the command line, load the config file, start the
//! daemon and run until Ctrl+C.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mtb_daemon::domain::config::DEFAULT_CONFIG_FILENAME;
use mtb_daemon::{DaemonConfig, DaemonRuntime};

/// MTB Daemon: TCP/JSON server for MTBbus modules
#[derive(Parser, Debug)]
#[command(name = "mtb-daemon")]
#[command(about = "TCP/JSON server for MTBbus modules", version)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILENAME)]
    config: PathBuf,

    /// Override the bind address from the config file
    #[arg(long)]
    host: Option<IpAddr>,

    /// Override the TCP port from the config file
    #[arg(short, long)]
    port: Option<u16>,
}

/// A missing file is not an error; the daemon starts with defaults.
fn load_config(args: &Args) -> Result<DaemonConfig> {
    let mut config = if args.config.exists() {
        DaemonConfig::load(&args.config)
            .with_context(|| format!("failed to load {}", args.config.display()))?
    } else {
        warn!(path = %args.config.display(), "Config file not found, using defaults");
        DaemonConfig::default()
    };

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("===========================================");
    info!("  MTB Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let runtime = DaemonRuntime::start(config).await?;
    info!(addr = %runtime.local_addr(), "Daemon is running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
