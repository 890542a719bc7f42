//! # Output Ownership
//!
//! Remembers which session last set each output port, so that the outputs
//! of a client can be returned to their safe values when it disconnects or
//! asks for it.

use mtb_bus::SessionId;
use mtb_types::ModuleAddress;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct OutputSetters {
    setters: BTreeMap<(ModuleAddress, u8), SessionId>,
}

impl OutputSetters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `session` the owner of `ports`, replacing any previous owner.
    pub fn record(
        &mut self,
        session: SessionId,
        address: ModuleAddress,
        ports: impl IntoIterator<Item = u8>,
    ) {
        for port in ports {
            self.setters.insert((address, port), session);
        }
    }

    /// Remove and return every port owned by `session`, grouped by module.
    pub fn take_session(&mut self, session: SessionId) -> BTreeMap<ModuleAddress, Vec<u8>> {
        let mut owned: BTreeMap<ModuleAddress, Vec<u8>> = BTreeMap::new();
        self.setters.retain(|&(address, port), owner| {
            if *owner != session {
                return true;
            }
            owned.entry(address).or_default().push(port);
            false
        });
        owned
    }

    /// Drop ownership of a deleted module.
    pub fn forget_module(&mut self, address: ModuleAddress) {
        self.setters.retain(|(owned, _), _| *owned != address);
    }

    #[must_use]
    pub fn owner(&self, address: ModuleAddress, port: u8) -> Option<SessionId> {
        self.setters.get(&(address, port)).copied()
    }
}
