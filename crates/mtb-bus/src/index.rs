//! # Subscription Index
//!
//! Reverse lookup from module address to subscribed sessions. Sessions own
//! their subscription sets; this index mirrors them for routing and is only
//! updated through the [`EventDispatcher`](crate::EventDispatcher).

use crate::subscriber::SessionId;
use mtb_types::ModuleAddress;
use std::collections::{BTreeMap, BTreeSet};

/// Address → sessions, plus the set of topology subscribers.
#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    by_address: BTreeMap<ModuleAddress, BTreeSet<SessionId>>,
    topology: BTreeSet<SessionId>,
}

impl SubscriptionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` for every address in `addresses`.
    pub fn add_modules<I>(&mut self, session: SessionId, addresses: I)
    where
        I: IntoIterator<Item = ModuleAddress>,
    {
        for addr in addresses {
            self.by_address.entry(addr).or_default().insert(session);
        }
    }

    /// Unregister `session` from every address in `addresses`.
    pub fn remove_modules<I>(&mut self, session: SessionId, addresses: I)
    where
        I: IntoIterator<Item = ModuleAddress>,
    {
        for addr in addresses {
            if let Some(sessions) = self.by_address.get_mut(&addr) {
                sessions.remove(&session);
                if sessions.is_empty() {
                    self.by_address.remove(&addr);
                }
            }
        }
    }

    pub fn set_topology(&mut self, session: SessionId, subscribed: bool) {
        if subscribed {
            self.topology.insert(session);
        } else {
            self.topology.remove(&session);
        }
    }

    /// Drop every trace of `session`.
    pub fn remove_session(&mut self, session: SessionId) {
        self.by_address.retain(|_, sessions| {
            sessions.remove(&session);
            !sessions.is_empty()
        });
        self.topology.remove(&session);
    }

    /// Sessions subscribed to `addr`.
    pub fn module_subscribers(&self, addr: ModuleAddress) -> impl Iterator<Item = SessionId> + '_ {
        self.by_address.get(&addr).into_iter().flatten().copied()
    }

    /// Sessions subscribed to topology changes.
    pub fn topology_subscribers(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.topology.iter().copied()
    }

    /// Whether any session watches `addr`.
    #[must_use]
    pub fn is_watched(&self, addr: ModuleAddress) -> bool {
        self.by_address.contains_key(&addr)
    }
}
