//! # Inbound Port - Bus Notifications
//!
//! Everything the bus driver can report about the physical bus. Notifications
//! travel over an unbounded channel and are applied to the core in arrival
//! order by a single pump task.

use mtb_types::ModuleAddress;
use tokio::sync::mpsc;

/// A state change observed on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusNotification {
    /// A module answered on the bus.
    ModuleDiscovered { address: ModuleAddress, type_code: u8 },

    /// A module stopped answering.
    ModuleFailed { address: ModuleAddress },

    /// An input port changed on the module.
    InputChanged {
        address: ModuleAddress,
        port: u8,
        value: bool,
    },

    /// The module confirmed an output value.
    OutputChanged {
        address: ModuleAddress,
        port: u8,
        value: bool,
    },

    /// A full bus scan finished. Lists every module that answered.
    ScanCompleted { modules: Vec<(ModuleAddress, u8)> },
}

/// Sending half used by bus drivers.
pub type BusNotifier = mpsc::UnboundedSender<BusNotification>;

/// Receiving half drained by the core's pump task.
pub type BusNotifications = mpsc::UnboundedReceiver<BusNotification>;

/// Create a notification channel.
#[must_use]
pub fn notification_channel() -> (BusNotifier, BusNotifications) {
    mpsc::unbounded_channel()
}
