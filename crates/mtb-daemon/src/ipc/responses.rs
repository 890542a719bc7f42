//! Response and event encoding.

use super::requests::RequestMeta;
use crate::domain::DaemonError;
use mtb_bus::ModuleEvent;
use serde_json::{json, Map, Value};

fn envelope(meta: &RequestMeta) -> Map<String, Value> {
    let mut message = Map::new();
    message.insert("command".into(), Value::String(meta.command.clone()));
    message.insert("type".into(), Value::String("response".into()));
    if let Some(id) = &meta.id {
        message.insert("id".into(), id.clone());
    }
    message
}

/// Successful response. Keys of `payload` (an object) are merged into the
/// top level of the message.
pub fn ok_response(meta: &RequestMeta, payload: Value) -> Value {
    let mut message = envelope(meta);
    message.insert("status".into(), Value::String("ok".into()));
    if let Value::Object(fields) = payload {
        message.extend(fields);
    }
    Value::Object(message)
}

pub fn error_response(meta: &RequestMeta, error: &DaemonError) -> Value {
    let mut message = envelope(meta);
    message.insert("status".into(), Value::String("error".into()));
    message.insert("error".into(), error.to_json());
    Value::Object(message)
}

/// Asynchronous event message as sent to subscribers.
pub fn event_message(event: &ModuleEvent) -> Value {
    let command = event.name();
    match event {
        ModuleEvent::InputsChanged {
            address,
            port,
            value,
        } => json!({
            "command": command,
            "type": "event",
            "module": address,
            "port": port,
            "value": value,
        }),
        ModuleEvent::OutputsChanged {
            address,
            port,
            value,
        } => json!({
            "command": command,
            "type": "event",
            "module": address,
            "port": port,
            "value": u8::from(*value),
        }),
        ModuleEvent::ModuleChanged { module, .. } => json!({
            "command": command,
            "type": "event",
            "module": module,
        }),
        ModuleEvent::ModuleDeleted { address } => json!({
            "command": command,
            "type": "event",
            "module": address,
        }),
    }
}
