//! Ports layer of the daemon.
//!
//! Defines the hexagonal architecture boundaries towards the bus hardware:
//! - Inbound (Driving): notifications the bus driver pushes into the core
//! - Outbound (Driven): commands the core sends to the bus driver

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
