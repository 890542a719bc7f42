//! Adapters implementing the daemon's ports.

pub mod loopback;

pub use loopback::LoopbackBus;
