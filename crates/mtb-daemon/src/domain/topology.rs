//! # Topology Store
//!
//! The set of modules currently present on the bus and the bookkeeping of
//! bus scans. Structural changes are reported to clients through the
//! registry's events; the store itself emits nothing.

use mtb_types::ModuleAddress;
use serde::Serialize;
use std::collections::BTreeSet;

/// Read-only view of the bus topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologySnapshot {
    pub active_modules: Vec<ModuleAddress>,
    pub scans: u64,
}

/// Difference between the known active set and a fresh scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanDiff {
    pub appeared: Vec<ModuleAddress>,
    pub disappeared: Vec<ModuleAddress>,
}

#[derive(Debug, Default)]
pub struct TopologyStore {
    active: BTreeSet<ModuleAddress>,
    scans: u64,
}

impl TopologyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the address was not active before.
    pub fn activate(&mut self, address: ModuleAddress) -> bool {
        self.active.insert(address)
    }

    /// Returns `true` if the address was active before.
    pub fn deactivate(&mut self, address: ModuleAddress) -> bool {
        self.active.remove(&address)
    }

    #[must_use]
    pub fn is_active(&self, address: ModuleAddress) -> bool {
        self.active.contains(&address)
    }

    /// Compare a completed scan against the known set.
    ///
    /// Only counts the scan; applying the diff is up to the caller so that
    /// registry and topology change together.
    pub fn apply_scan(&mut self, found: &BTreeSet<ModuleAddress>) -> ScanDiff {
        self.scans += 1;
        ScanDiff {
            appeared: found.difference(&self.active).copied().collect(),
            disappeared: self.active.difference(found).copied().collect(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            active_modules: self.active.iter().copied().collect(),
            scans: self.scans,
        }
    }
}
