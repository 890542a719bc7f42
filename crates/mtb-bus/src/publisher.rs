//! # Event Dispatcher
//!
//! The publishing side of the bus. Owns the subscription index and the
//! sending half of every session queue.

use crate::events::{EventTopic, ModuleEvent};
use crate::index::SubscriptionIndex;
use crate::subscriber::{EventQueue, SessionId};
use crate::DEFAULT_QUEUE_CAPACITY;
use mtb_types::ModuleAddress;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Trait for publishing events to subscribed sessions.
pub trait EventPublisher {
    /// Publish an event.
    ///
    /// # Returns
    ///
    /// The number of sessions the event was enqueued for.
    fn publish(&mut self, event: &ModuleEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// Routes events to session queues according to the subscription index.
///
/// Not internally synchronized: the owner serializes access so that a
/// mutation and its fan-out are observed atomically.
#[derive(Debug)]
pub struct EventDispatcher {
    index: SubscriptionIndex,
    queues: HashMap<SessionId, mpsc::Sender<ModuleEvent>>,
    capacity: usize,
    events_published: u64,
}

impl EventDispatcher {
    /// Create a dispatcher with the default per-session capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a dispatcher with the given per-session capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: SubscriptionIndex::new(),
            queues: HashMap::new(),
            capacity: capacity.max(1),
            events_published: 0,
        }
    }

    /// Register a session and hand out its queue.
    pub fn register(&mut self, session: SessionId) -> EventQueue {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.queues.insert(session, tx);
        debug!(session = %session, "Session registered");
        EventQueue::new(session, rx)
    }

    /// Forget a session. Its queue closes once drained.
    ///
    /// Returns `false` if the session was not registered.
    pub fn unregister(&mut self, session: SessionId) -> bool {
        self.index.remove_session(session);
        let removed = self.queues.remove(&session).is_some();
        if removed {
            debug!(session = %session, "Session unregistered");
        }
        removed
    }

    /// Whether `session` is still registered.
    #[must_use]
    pub fn is_registered(&self, session: SessionId) -> bool {
        self.queues.contains_key(&session)
    }

    pub fn subscribe_modules(&mut self, session: SessionId, addresses: &[ModuleAddress]) {
        if self.is_registered(session) {
            self.index.add_modules(session, addresses.iter().copied());
        }
    }

    pub fn unsubscribe_modules(&mut self, session: SessionId, addresses: &[ModuleAddress]) {
        self.index.remove_modules(session, addresses.iter().copied());
    }

    pub fn set_topology(&mut self, session: SessionId, subscribed: bool) {
        if !subscribed || self.is_registered(session) {
            self.index.set_topology(session, subscribed);
        }
    }

    /// Sessions that must receive `event`.
    #[must_use]
    pub fn targets(&self, event: &ModuleEvent) -> BTreeSet<SessionId> {
        let mut targets: BTreeSet<SessionId> =
            self.index.module_subscribers(event.address()).collect();
        if event.topic() == EventTopic::Topology {
            targets.extend(self.index.topology_subscribers());
        }
        targets
    }

    /// Read-only view of the index.
    #[must_use]
    pub fn index(&self) -> &SubscriptionIndex {
        &self.index
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.queues.len()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for EventDispatcher {
    fn publish(&mut self, event: &ModuleEvent) -> usize {
        self.events_published += 1;

        let mut delivered = 0;
        let mut dropped = Vec::new();

        for session in self.targets(event) {
            let Some(tx) = self.queues.get(&session) else {
                continue;
            };
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        session = %session,
                        event = event.name(),
                        "Session lagging, dropping it"
                    );
                    dropped.push(session);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(session = %session, "Session queue closed");
                    dropped.push(session);
                }
            }
        }

        for session in dropped {
            self.unregister(session);
        }

        debug!(
            event = event.name(),
            address = %event.address(),
            receivers = delivered,
            "Event published"
        );
        delivered
    }

    fn events_published(&self) -> u64 {
        self.events_published
    }
}
