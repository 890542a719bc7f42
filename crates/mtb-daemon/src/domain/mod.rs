//! Domain layer: module state, topology, subscriptions and errors.
//!
//! Nothing here knows about sockets or the bus hardware.

pub mod config;
pub mod error;
pub mod outputs;
pub mod registry;
pub mod subscriptions;
pub mod topology;

pub use config::{ConfigError, DaemonConfig, ModuleSeed};
pub use error::{codes, DaemonError};
pub use outputs::OutputSetters;
pub use registry::{Module, ModuleRegistry, ModuleUpdate};
pub use subscriptions::{AddressSelection, Replacement, SubscriptionSet};
pub use topology::{ScanDiff, TopologySnapshot, TopologyStore};
