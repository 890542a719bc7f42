//! # Loopback Bus
//!
//! Simulated bus with every output port wired back to the input port of the
//! same index, like the test rig the daemon is verified against. Writing an
//! output therefore yields an `OutputChanged` confirmation followed by an
//! `InputChanged` report.

use crate::domain::config::BusConfig;
use crate::domain::ConfigError;
use crate::ports::{BusDriver, BusError, BusNotification, BusNotifier};
use async_trait::async_trait;
use mtb_types::ModuleAddress;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Simulated bus driver.
pub struct LoopbackBus {
    notifier: BusNotifier,
    /// Present modules and their type codes.
    present: RwLock<BTreeMap<ModuleAddress, u8>>,
}

impl LoopbackBus {
    pub fn new(notifier: BusNotifier, modules: impl IntoIterator<Item = (ModuleAddress, u8)>) -> Self {
        Self {
            notifier,
            present: RwLock::new(modules.into_iter().collect()),
        }
    }

    /// Build from the `bus` section of the config file.
    pub fn from_config(notifier: BusNotifier, config: &BusConfig) -> Result<Self, ConfigError> {
        let modules = config
            .simulated_modules
            .iter()
            .map(|m| {
                ModuleAddress::new(m.address)
                    .map(|addr| (addr, m.type_code))
                    .map_err(|_| ConfigError::InvalidAddress(m.address.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(notifier, modules))
    }

    /// Report the initial scan.
    pub fn start(&self) {
        let modules: Vec<_> = self.present.read().iter().map(|(a, t)| (*a, *t)).collect();
        info!(modules = modules.len(), "Loopback bus scan");
        self.notify(BusNotification::ScanCompleted { modules });
    }

    /// Simulate a module being plugged in.
    pub fn attach(&self, address: ModuleAddress, type_code: u8) {
        self.present.write().insert(address, type_code);
        self.notify(BusNotification::ModuleDiscovered { address, type_code });
    }

    /// Simulate a module losing power.
    pub fn detach(&self, address: ModuleAddress) {
        if self.present.write().remove(&address).is_some() {
            self.notify(BusNotification::ModuleFailed { address });
        }
    }

    /// Simulate a failed module answering again. Nothing is reported; the
    /// module comes back only when someone asks for it.
    pub fn reconnect(&self, address: ModuleAddress, type_code: u8) {
        self.present.write().insert(address, type_code);
    }

    /// Simulate an input change coming from the field.
    pub fn press(&self, address: ModuleAddress, port: u8, value: bool) {
        self.notify(BusNotification::InputChanged {
            address,
            port,
            value,
        });
    }

    fn notify(&self, notification: BusNotification) -> bool {
        if self.notifier.send(notification).is_err() {
            debug!("Bus notification dropped, core is gone");
            return false;
        }
        true
    }
}

#[async_trait]
impl BusDriver for LoopbackBus {
    async fn write_outputs(
        &self,
        address: ModuleAddress,
        outputs: &[(u8, bool)],
    ) -> Result<(), BusError> {
        if !self.present.read().contains_key(&address) {
            return Err(BusError::NoResponse(address));
        }
        for &(port, value) in outputs {
            let confirmed = self.notify(BusNotification::OutputChanged {
                address,
                port,
                value,
            }) && self.notify(BusNotification::InputChanged {
                address,
                port,
                value,
            });
            if !confirmed {
                return Err(BusError::Disconnected);
            }
        }
        Ok(())
    }

    async fn identify(&self, address: ModuleAddress) -> Result<u8, BusError> {
        if self.notifier.is_closed() {
            return Err(BusError::Disconnected);
        }
        self.present
            .read()
            .get(&address)
            .copied()
            .ok_or(BusError::NoResponse(address))
    }

    fn is_connected(&self) -> bool {
        !self.notifier.is_closed()
    }
}
