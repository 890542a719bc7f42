//! Client request decoding.
//!
//! A request is one JSON object per line:
//! `{"command": "...", "type": "request", "id": <any>, ...fields}`.
//!
//! Addresses stay raw JSON numbers until the handler validates them, so that
//! values beyond any integer type still map to an address error.

use crate::domain::DaemonError;
use serde::Deserialize;
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Echoed back in the response regardless of whether the command parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMeta {
    pub command: String,
    pub id: Option<Value>,
}

/// Every command understood by the daemon.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    ModuleSubscribe {
        addresses: Option<Vec<Number>>,
    },
    ModuleUnsubscribe {
        addresses: Option<Vec<Number>>,
    },
    /// Without `addresses` a getter, with `addresses` a setter.
    MyModuleSubscribes {
        addresses: Option<Vec<Number>>,
    },
    TopologySubscribe,
    TopologyUnsubscribe,
    ModuleSetConfig {
        address: Number,
        type_code: Option<u8>,
        name: Option<String>,
        config: Option<Value>,
    },
    ModuleDelete {
        address: Number,
    },
    Module {
        address: Number,
    },
    Modules,
    /// `outputs` maps port numbers (as strings) to values.
    ModuleSetOutputs {
        address: Number,
        outputs: BTreeMap<String, i64>,
    },
    /// Return every output this client set to its safe value.
    ResetMyOutputs,
    Mtbusb,
    Version,
}

impl Command {
    /// Whether the command changes module state and so needs write access.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::ModuleSetConfig { .. }
                | Self::ModuleDelete { .. }
                | Self::ModuleSetOutputs { .. }
                | Self::ResetMyOutputs
        )
    }

    /// Wire names of all commands.
    pub const NAMES: &'static [&'static str] = &[
        "module_subscribe",
        "module_unsubscribe",
        "my_module_subscribes",
        "topology_subscribe",
        "topology_unsubscribe",
        "module_set_config",
        "module_delete",
        "module",
        "modules",
        "module_set_outputs",
        "reset_my_outputs",
        "mtbusb",
        "version",
    ];
}

/// Decode one request line.
///
/// The metadata is returned even when decoding fails so that the error
/// response can still carry the command name and id.
pub fn parse_request(line: &str) -> (RequestMeta, Result<Command, DaemonError>) {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            return (
                RequestMeta::default(),
                Err(DaemonError::InvalidRequest(format!("Parse error: {e}"))),
            );
        }
    };

    let meta = RequestMeta {
        command: value
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        id: value.get("id").cloned(),
    };

    if !value.is_object() {
        return (
            meta,
            Err(DaemonError::InvalidRequest("expected JSON object".into())),
        );
    }
    if meta.command.is_empty() {
        return (
            meta,
            Err(DaemonError::InvalidRequest("missing command".into())),
        );
    }
    if !Command::NAMES.contains(&meta.command.as_str()) {
        let err = DaemonError::UnknownCommand(meta.command.clone());
        return (meta, Err(err));
    }

    let command =
        serde_json::from_value(value).map_err(|e| DaemonError::InvalidRequest(e.to_string()));
    (meta, command)
}
