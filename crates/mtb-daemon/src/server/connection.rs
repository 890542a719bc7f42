//! Per-client connection loop.
//!
//! Interleaves request lines from the socket with events from the
//! session's queue. Responses and events share one writer, so every line
//! written is a complete JSON message.
//!
//! When the client goes away, for whatever reason, the outputs it set are
//! returned to their safe values.

use super::lines::{Line, LineReader};
use crate::domain::config::ServerConfig;
use crate::domain::DaemonError;
use crate::ipc::{error_response, event_message, Access, RequestMeta, Session};
use crate::service::DaemonCore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Handler of one accepted TCP connection.
pub struct Connection {
    core: Arc<DaemonCore>,
    peer: SocketAddr,
    max_message_size: usize,
    access: Access,
}

impl Connection {
    pub fn new(core: Arc<DaemonCore>, peer: SocketAddr, config: &ServerConfig) -> Self {
        let access = if config.has_write_access(peer.ip()) {
            Access::ReadWrite
        } else {
            Access::ReadOnly
        };
        Self {
            core,
            peer,
            max_message_size: config.max_message_size,
            access,
        }
    }

    /// Response to a line that never reached the request parser.
    fn framing_error(&self, line: &Line) -> String {
        let error = match line {
            Line::TooLong(size) => {
                warn!(
                    peer = %self.peer,
                    size = size,
                    max = self.max_message_size,
                    "Message exceeds size limit"
                );
                DaemonError::InvalidRequest(format!(
                    "Message too large: {} bytes (max: {})",
                    size, self.max_message_size
                ))
            }
            _ => {
                warn!(peer = %self.peer, "Message is not valid UTF-8");
                DaemonError::InvalidRequest("Message is not valid UTF-8".into())
            }
        };
        error_response(&RequestMeta::default(), &error).to_string()
    }

    /// Serve the client until it disconnects, lags behind or the server
    /// shuts down.
    pub async fn handle(self, stream: TcpStream, mut shutdown: watch::Receiver<bool>) {
        let (reader, mut writer) = stream.into_split();
        let mut lines = LineReader::new(reader, self.max_message_size);
        let (mut session, mut queue) = Session::open(self.core.clone(), self.access);
        info!(
            peer = %self.peer,
            session = %session.id(),
            access = ?self.access,
            "Client connected"
        );

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let response = match line {
                        Ok(Line::Text(line)) if line.trim().is_empty() => continue,
                        Ok(Line::Text(line)) => session.handle_line(&line).await,
                        Ok(Line::Eof) => break,
                        Ok(rejected) => self.framing_error(&rejected),
                        Err(e) => {
                            warn!(peer = %self.peer, error = %e, "Read failed");
                            break;
                        }
                    };
                    if let Err(e) = write_line(&mut writer, &response).await {
                        warn!(peer = %self.peer, error = %e, "Failed to send response");
                        break;
                    }
                }
                event = queue.recv() => {
                    let Some(event) = event else {
                        warn!(peer = %self.peer, "Event queue overflowed, disconnecting client");
                        break;
                    };
                    debug!(peer = %self.peer, event = event.name(), "Sending event");
                    let message = event_message(&event).to_string();
                    if let Err(e) = write_line(&mut writer, &message).await {
                        warn!(peer = %self.peer, error = %e, "Failed to send event");
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    debug!(peer = %self.peer, "Closing connection on shutdown");
                    break;
                }
            }
        }

        session.reset_outputs().await;
        session.close();
        info!(peer = %self.peer, "Client disconnected");
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, message: &str) -> std::io::Result<()> {
    writer.write_all(message.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
