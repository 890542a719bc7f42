//! # Module Registry
//!
//! Per-address module state. Every mutating operation returns the events it
//! caused instead of notifying anyone, so the caller decides when and under
//! which lock they are published.

use super::error::DaemonError;
use mtb_bus::ModuleEvent;
use mtb_types::{ModuleAddress, ModuleKind, ModuleView};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A configured or discovered module.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub address: ModuleAddress,
    pub type_code: u8,
    pub name: String,
    pub config: Value,
    pub inputs: Vec<bool>,
    pub outputs: Vec<bool>,
    pub active: bool,
}

impl Module {
    fn new(address: ModuleAddress, type_code: u8) -> Self {
        let kind = ModuleKind::from_type_code(type_code);
        Self {
            address,
            type_code,
            name: String::new(),
            config: kind.default_config(),
            inputs: vec![false; kind.input_count()],
            outputs: vec![false; kind.output_count()],
            active: false,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ModuleKind {
        ModuleKind::from_type_code(self.type_code)
    }

    /// Value the output returns to when its setter goes away.
    ///
    /// Read from `config.outputsSafe`, whose entries are either plain
    /// numbers or `{"value": n}` objects. Anything unreadable is off.
    #[must_use]
    pub fn safe_output(&self, port: u8) -> bool {
        let entry = &self.config["outputsSafe"][usize::from(port)];
        let value = entry.get("value").unwrap_or(entry);
        value
            .as_u64()
            .map(|v| v != 0)
            .or_else(|| value.as_bool())
            .unwrap_or(false)
    }

    fn set_type(&mut self, type_code: u8) {
        if self.type_code == type_code {
            return;
        }
        self.type_code = type_code;
        let kind = self.kind();
        self.inputs.resize(kind.input_count(), false);
        self.outputs.resize(kind.output_count(), false);
    }

    /// Wire projection.
    #[must_use]
    pub fn view(&self) -> ModuleView {
        ModuleView {
            address: self.address,
            type_code: self.type_code,
            name: self.name.clone(),
            active: self.active,
            config: self.config.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.iter().map(|&o| u8::from(o)).collect(),
        }
    }
}

/// Fields of a `module_set_config` request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleUpdate {
    pub type_code: Option<u8>,
    pub name: Option<String>,
    /// `None` resets the configuration to the type's default.
    pub config: Option<Value>,
}

/// Owns every module known to the daemon.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<ModuleAddress, Module>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or edit a module.
    ///
    /// # Errors
    /// - `InvalidRequest`: creating a module without a `type_code`
    pub fn set_config(
        &mut self,
        address: ModuleAddress,
        update: ModuleUpdate,
    ) -> Result<(ModuleView, Vec<ModuleEvent>), DaemonError> {
        let previous = self.modules.get(&address).map(Module::view);

        let module = match self.modules.entry(address) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let type_code = update.type_code.ok_or_else(|| {
                    DaemonError::InvalidRequest(format!(
                        "type_code is required to create module {address}"
                    ))
                })?;
                entry.insert(Module::new(address, type_code))
            }
        };

        if let Some(type_code) = update.type_code {
            module.set_type(type_code);
        }
        if let Some(name) = update.name {
            module.name = name;
        }
        module.config = match update.config {
            Some(config) => config,
            None => module.kind().default_config(),
        };

        let view = module.view();
        let events = match previous {
            None => vec![ModuleEvent::ModuleChanged {
                module: view.clone(),
                structural: true,
            }],
            Some(prev) if prev != view => vec![ModuleEvent::ModuleChanged {
                module: view.clone(),
                structural: false,
            }],
            Some(_) => Vec::new(),
        };
        Ok((view, events))
    }

    /// Remove a module. Always reports the deletion, even for an empty slot.
    pub fn delete(&mut self, address: ModuleAddress) -> Vec<ModuleEvent> {
        if self.modules.remove(&address).is_none() {
            debug!(address = %address, "Deleting empty module slot");
        }
        vec![ModuleEvent::ModuleDeleted { address }]
    }

    /// Mark a module present on the bus, creating it if unknown.
    pub fn activate(&mut self, address: ModuleAddress, type_code: u8) -> Vec<ModuleEvent> {
        let previous = self.modules.get(&address).map(Module::view);
        let module = self
            .modules
            .entry(address)
            .or_insert_with(|| Module::new(address, type_code));

        if module.type_code != type_code {
            warn!(
                address = %address,
                configured = module.type_code,
                reported = type_code,
                "Bus reports a different module type than configured"
            );
        }
        module.active = true;

        let view = module.view();
        if previous.as_ref() == Some(&view) {
            return Vec::new();
        }
        vec![ModuleEvent::ModuleChanged {
            module: view,
            structural: true,
        }]
    }

    /// Mark a module as gone from the bus. Input state is no longer known.
    pub fn deactivate(&mut self, address: ModuleAddress) -> Vec<ModuleEvent> {
        let Some(module) = self.modules.get_mut(&address) else {
            return Vec::new();
        };
        if !module.active {
            return Vec::new();
        }
        module.active = false;
        module.inputs.iter_mut().for_each(|i| *i = false);
        vec![ModuleEvent::ModuleChanged {
            module: module.view(),
            structural: true,
        }]
    }

    /// Record an output value confirmed by the bus driver.
    pub fn set_output(&mut self, address: ModuleAddress, port: u8, value: bool) -> Option<ModuleEvent> {
        let bit = self.bit_mut(address, port, |m| &mut m.outputs)?;
        if *bit == value {
            return None;
        }
        *bit = value;
        Some(ModuleEvent::OutputsChanged {
            address,
            port,
            value,
        })
    }

    /// Record an input value reported by the bus driver.
    pub fn apply_input(&mut self, address: ModuleAddress, port: u8, value: bool) -> Option<ModuleEvent> {
        let bit = self.bit_mut(address, port, |m| &mut m.inputs)?;
        if *bit == value {
            return None;
        }
        *bit = value;
        Some(ModuleEvent::InputsChanged {
            address,
            port,
            value,
        })
    }

    fn bit_mut(
        &mut self,
        address: ModuleAddress,
        port: u8,
        bits: impl FnOnce(&mut Module) -> &mut Vec<bool>,
    ) -> Option<&mut bool> {
        let Some(module) = self.modules.get_mut(&address) else {
            debug!(address = %address, "Bus report for unknown module ignored");
            return None;
        };
        let bit = bits(module).get_mut(usize::from(port));
        if bit.is_none() {
            debug!(address = %address, port = port, "Bus report for unknown port ignored");
        }
        bit
    }

    /// Every valid address, ascending.
    #[must_use]
    pub fn all_addresses() -> Vec<ModuleAddress> {
        ModuleAddress::all().collect()
    }

    #[must_use]
    pub fn get(&self, address: ModuleAddress) -> Option<&Module> {
        self.modules.get(&address)
    }

    #[must_use]
    pub fn module(&self, address: ModuleAddress) -> Option<ModuleView> {
        self.modules.get(&address).map(Module::view)
    }

    /// All modules, ascending by address.
    #[must_use]
    pub fn modules(&self) -> Vec<ModuleView> {
        self.modules.values().map(Module::view).collect()
    }

    /// Known modules not present on the bus.
    #[must_use]
    pub fn inactive(&self) -> Vec<ModuleAddress> {
        self.modules
            .values()
            .filter(|m| !m.active)
            .map(|m| m.address)
            .collect()
    }
}
