//! # Module Projection
//!
//! The type families known to the daemon and the JSON projection of a module.

use crate::address::ModuleAddress;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Module family derived from the MTBbus type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// MTB-UNI, all hardware revisions (0x10..=0x1F).
    Uni,
    /// MTB-UNIS (0x50).
    Unis,
    /// MTB-RC railcom detector (0x30).
    Rc,
    /// Type code the daemon has no layout for.
    Unknown(u8),
}

impl ModuleKind {
    /// Classify a raw type code.
    #[must_use]
    pub fn from_type_code(code: u8) -> Self {
        match code {
            0x10..=0x1F => Self::Uni,
            0x30 => Self::Rc,
            0x50 => Self::Unis,
            other => Self::Unknown(other),
        }
    }

    /// Number of input ports.
    #[must_use]
    pub fn input_count(self) -> usize {
        match self {
            Self::Uni | Self::Unis => 16,
            Self::Rc => 8,
            Self::Unknown(_) => 0,
        }
    }

    /// Number of output ports.
    #[must_use]
    pub fn output_count(self) -> usize {
        match self {
            Self::Uni => 16,
            Self::Unis => 28,
            Self::Rc | Self::Unknown(_) => 0,
        }
    }

    /// Configuration applied when a client omits `config`.
    #[must_use]
    pub fn default_config(self) -> Value {
        let mut config = serde_json::Map::new();
        if self.output_count() > 0 {
            config.insert("outputsSafe".into(), json!(vec![0; self.output_count()]));
        }
        if self.input_count() > 0 {
            config.insert("inputsDelay".into(), json!(vec![0; self.input_count()]));
        }
        Value::Object(config)
    }
}

/// Wire projection of a module.
///
/// Inputs are booleans; outputs are integer values so that `0`/`1` round-trip
/// exactly as clients send them in `module_set_outputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleView {
    pub address: ModuleAddress,
    pub type_code: u8,
    pub name: String,
    pub active: bool,
    pub config: Value,
    pub inputs: Vec<bool>,
    pub outputs: Vec<u8>,
}
