//! Per-session subscription state.
//!
//! Owned by exactly one session. The core mirrors every change into the
//! dispatcher's index, using the `added`/`removed` sets these operations
//! return.

use mtb_types::ModuleAddress;
use serde_json::Number;
use std::collections::BTreeSet;

/// Addresses named by a request. An omitted list means every address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSelection {
    All,
    Only(Vec<ModuleAddress>),
}

impl AddressSelection {
    /// Validate a raw address list as a whole.
    pub fn parse(raw: Option<&[Number]>) -> Result<Self, mtb_types::AddressError> {
        match raw {
            None => Ok(Self::All),
            Some(raw) => ModuleAddress::parse_numbers(raw).map(Self::Only),
        }
    }

    fn into_set(self) -> BTreeSet<ModuleAddress> {
        match self {
            Self::All => ModuleAddress::all().collect(),
            Self::Only(addresses) => addresses.into_iter().collect(),
        }
    }
}

/// Result of replacing the module subscriptions wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replacement {
    pub added: Vec<ModuleAddress>,
    pub removed: Vec<ModuleAddress>,
}

/// Module addresses and topology flag of one session.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSet {
    modules: BTreeSet<ModuleAddress>,
    topology: bool,
}

impl SubscriptionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add addresses; returns the ones that were not subscribed before.
    pub fn subscribe_modules(&mut self, selection: AddressSelection) -> Vec<ModuleAddress> {
        selection
            .into_set()
            .into_iter()
            .filter(|addr| self.modules.insert(*addr))
            .collect()
    }

    /// Remove addresses; returns the ones that were actually subscribed.
    pub fn unsubscribe_modules(&mut self, selection: AddressSelection) -> Vec<ModuleAddress> {
        match selection {
            AddressSelection::All => std::mem::take(&mut self.modules).into_iter().collect(),
            AddressSelection::Only(addresses) => {
                let removed: BTreeSet<_> = addresses
                    .into_iter()
                    .filter(|addr| self.modules.remove(addr))
                    .collect();
                removed.into_iter().collect()
            }
        }
    }

    /// Make the subscription set exactly `addresses`.
    pub fn replace_modules(&mut self, addresses: Vec<ModuleAddress>) -> Replacement {
        let target: BTreeSet<_> = addresses.into_iter().collect();
        let replacement = Replacement {
            added: target.difference(&self.modules).copied().collect(),
            removed: self.modules.difference(&target).copied().collect(),
        };
        self.modules = target;
        replacement
    }

    /// Current module subscriptions, ascending.
    #[must_use]
    pub fn modules(&self) -> Vec<ModuleAddress> {
        self.modules.iter().copied().collect()
    }

    /// Returns `true` if the flag changed.
    pub fn set_topology(&mut self, subscribed: bool) -> bool {
        std::mem::replace(&mut self.topology, subscribed) != subscribed
    }

    #[must_use]
    pub fn is_topology_subscribed(&self) -> bool {
        self.topology
    }
}
