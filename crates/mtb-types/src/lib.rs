//! # MTB Types Crate
//!
//! Value types shared by every crate in the workspace.
//!
//! ## Design Principles
//!
//! - **Validated at the edge**: a [`ModuleAddress`] can only be constructed
//!   for an address in `1..=255`; everything past decoding works with the
//!   newtype and never re-checks the range.
//! - **One projection**: [`ModuleView`] is the only shape a module takes on
//!   the wire, both in responses and in `module` events.

pub mod address;
pub mod module;

pub use address::{AddressError, ModuleAddress, MAX_ADDRESS, MIN_ADDRESS};
pub use module::{ModuleKind, ModuleView};
