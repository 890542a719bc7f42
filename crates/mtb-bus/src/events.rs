//! # Module Events
//!
//! Every change a client can observe, produced by the registry and consumed
//! by the dispatcher.

use mtb_types::{ModuleAddress, ModuleView};

/// Audience class of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTopic {
    /// Only sessions subscribed to the module address.
    Module,
    /// Module subscribers plus topology subscribers.
    Topology,
}

/// A single observable change of module state.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleEvent {
    /// An input port changed its value.
    InputsChanged {
        address: ModuleAddress,
        port: u8,
        value: bool,
    },

    /// An output port changed its value.
    OutputsChanged {
        address: ModuleAddress,
        port: u8,
        value: bool,
    },

    /// Name, type, config or activity of a module changed.
    ///
    /// `structural` is set when the module appeared or its activity flipped;
    /// such changes are also topology changes.
    ModuleChanged {
        module: ModuleView,
        structural: bool,
    },

    /// A module was deleted.
    ModuleDeleted { address: ModuleAddress },
}

impl ModuleEvent {
    /// Address the event is about.
    #[must_use]
    pub fn address(&self) -> ModuleAddress {
        match self {
            Self::InputsChanged { address, .. }
            | Self::OutputsChanged { address, .. }
            | Self::ModuleDeleted { address } => *address,
            Self::ModuleChanged { module, .. } => module.address,
        }
    }

    /// Who should receive the event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ModuleDeleted { .. } => EventTopic::Topology,
            Self::ModuleChanged {
                structural: true, ..
            } => EventTopic::Topology,
            _ => EventTopic::Module,
        }
    }

    /// Command name used on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InputsChanged { .. } => "module_inputs_changed",
            Self::OutputsChanged { .. } => "module_outputs_changed",
            Self::ModuleChanged { .. } => "module",
            Self::ModuleDeleted { .. } => "module_deleted",
        }
    }
}
