//! # Daemon Runtime
//!
//! Wires the core, the loopback bus and the TCP server together.
//!
//! ## Startup Sequence
//!
//! 1. Create the bus notification channel and the bus driver
//! 2. Create the core and seed modules from the config
//! 3. Spawn the bus pump
//! 4. Bind the TCP server and start accepting clients
//! 5. Report the initial bus scan
//! 6. Start the periodic reactivation of inactive modules

use crate::adapters::LoopbackBus;
use crate::domain::DaemonConfig;
use crate::ports::notification_channel;
use crate::server::DaemonServer;
use crate::service::DaemonCore;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// A running daemon.
pub struct DaemonRuntime {
    core: Arc<DaemonCore>,
    bus: Arc<LoopbackBus>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    server: JoinHandle<()>,
}

impl DaemonRuntime {
    /// Start a daemon from a validated configuration.
    pub async fn start(config: DaemonConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let (notifier, notifications) = notification_channel();
        let bus = Arc::new(
            LoopbackBus::from_config(notifier, &config.bus).context("invalid bus configuration")?,
        );
        let core = Arc::new(DaemonCore::new(
            bus.clone(),
            config.server.event_queue_capacity,
        ));
        core.seed(config.seeded_modules()?)
            .context("failed to seed modules")?;
        info!(modules = core.modules().len(), "Modules loaded");

        tokio::spawn(core.clone().run_bus_pump(notifications));

        let server = DaemonServer::bind(config.server.clone(), core.clone())
            .await
            .with_context(|| format!("failed to bind {}", config.server_addr()))?;
        let local_addr = server.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(server.run(shutdown_rx.clone()));

        bus.start();
        tokio::spawn(
            core.clone()
                .run_reactivation(config.bus.reactivate_period(), shutdown_rx),
        );

        Ok(Self {
            core,
            bus,
            local_addr,
            shutdown_tx,
            server,
        })
    }

    /// Address the server actually listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn core(&self) -> Arc<DaemonCore> {
        Arc::clone(&self.core)
    }

    /// The simulated bus, for injecting field events.
    pub fn bus(&self) -> Arc<LoopbackBus> {
        Arc::clone(&self.bus)
    }

    /// Stop accepting clients and close every open connection.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        if let Err(e) = self.server.await {
            error!(error = %e, "Server task failed");
        }
        info!("Shutdown complete");
    }
}
