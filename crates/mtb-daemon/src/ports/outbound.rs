//! # Outbound Port - Bus Driver
//!
//! Commands the core sends to the bus. Results of a command are not returned
//! directly: the driver confirms them through
//! [`BusNotification`](super::inbound::BusNotification)s, which is the only
//! path that mutates module I/O state.

use async_trait::async_trait;
use mtb_types::ModuleAddress;
use thiserror::Error;

/// Errors reported by a bus driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// The bus interface is not connected.
    #[error("Bus interface disconnected")]
    Disconnected,

    /// A previous write to the module has not finished.
    #[error("Module {0} is already being written")]
    AlreadyWriting(ModuleAddress),

    /// The module did not answer after all retries.
    #[error("Module {0} did not answer")]
    NoResponse(ModuleAddress),
}

/// Driver of the physical (or simulated) module bus.
#[async_trait]
pub trait BusDriver: Send + Sync {
    /// Write output values of one module.
    async fn write_outputs(
        &self,
        address: ModuleAddress,
        outputs: &[(u8, bool)],
    ) -> Result<(), BusError>;

    /// Ask a single module for its type code.
    ///
    /// Only answers; discovery is still reported through notifications.
    ///
    /// # Errors
    /// - `NoResponse`: nothing answers at the address
    async fn identify(&self, address: ModuleAddress) -> Result<u8, BusError>;

    /// Whether the bus interface is currently connected.
    fn is_connected(&self) -> bool;
}
