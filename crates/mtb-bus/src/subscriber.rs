//! # Session Queues
//!
//! The receiving side of the bus: one bounded queue per client session.

use crate::events::ModuleEvent;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// Identifier of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Errors from queue operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The dispatcher dropped this session (unregistered or lagging).
    #[error("Event queue closed")]
    Closed,
}

/// Outbound events of one session.
///
/// The queue closes once the dispatcher forgets the session, either because
/// the session unregistered or because it fell too far behind.
#[derive(Debug)]
pub struct EventQueue {
    session: SessionId,
    receiver: mpsc::Receiver<ModuleEvent>,
}

impl EventQueue {
    pub(crate) fn new(session: SessionId, receiver: mpsc::Receiver<ModuleEvent>) -> Self {
        Self { session, receiver }
    }

    /// Session this queue belongs to.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Wait for the next event. `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<ModuleEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is ready.
    pub fn try_recv(&mut self) -> Result<Option<ModuleEvent>, QueueError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(QueueError::Closed),
        }
    }
}
