//! # TCP Server
//!
//! Accepts clients and spawns one [`Connection`] task per socket.

pub mod connection;
pub mod lines;

pub use connection::Connection;
pub use lines::{Line, LineReader};

use crate::domain::config::ServerConfig;
use crate::service::DaemonCore;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Listening TCP server.
pub struct DaemonServer {
    listener: TcpListener,
    core: Arc<DaemonCore>,
    config: ServerConfig,
}

impl DaemonServer {
    /// Bind the listening socket. Port 0 picks a free port.
    pub async fn bind(config: ServerConfig, core: Arc<DaemonCore>) -> io::Result<Self> {
        let addr = SocketAddr::new(config.host, config.port);
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "TCP server listening");
        Ok(Self {
            listener,
            core,
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients until `shutdown` flips to true or its sender is
    /// dropped. Open connections are closed as well.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            error!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
                        }
                        let connection = Connection::new(self.core.clone(), peer, &self.config);
                        tokio::spawn(connection.handle(stream, shutdown.clone()));
                    }
                    Err(e) => error!(error = %e, "Accept failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("TCP server stopped");
    }
}
