//! # Client Session
//!
//! Request handling for one connected client. The session owns its
//! subscription set and is unregistered from the core when dropped.
//! Sessions opened from hosts without write access may only read and
//! subscribe.

use super::requests::{parse_request, Command};
use super::responses::{error_response, ok_response};
use crate::domain::{AddressSelection, DaemonError, ModuleUpdate, SubscriptionSet};
use crate::service::DaemonCore;
use mtb_bus::{EventQueue, SessionId};
use mtb_types::ModuleAddress;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// What a session is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
}

/// One client's view of the daemon.
pub struct Session {
    id: SessionId,
    core: Arc<DaemonCore>,
    subscriptions: SubscriptionSet,
    access: Access,
    closed: bool,
}

impl Session {
    /// Register a session with the core. The returned queue carries the
    /// events the session subscribes to.
    pub fn open(core: Arc<DaemonCore>, access: Access) -> (Self, EventQueue) {
        let (id, queue) = core.open_session();
        debug!(session = %id, access = ?access, "Session opened");
        let session = Self {
            id,
            core,
            subscriptions: SubscriptionSet::new(),
            access,
            closed: false,
        };
        (session, queue)
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    /// Handle one request line and produce the serialized response.
    pub async fn handle_line(&mut self, line: &str) -> String {
        let (meta, command) = parse_request(line);
        let result = match command {
            Ok(command) => self.handle_command(command).await,
            Err(e) => Err(e),
        };
        let response = match result {
            Ok(payload) => ok_response(&meta, payload),
            Err(e) => {
                debug!(session = %self.id, command = %meta.command, error = %e, "Request failed");
                error_response(&meta, &e)
            }
        };
        response.to_string()
    }

    /// Execute a decoded command; returns the response payload.
    pub async fn handle_command(&mut self, command: Command) -> Result<Value, DaemonError> {
        if command.is_write() && self.access == Access::ReadOnly {
            return Err(DaemonError::WriteAccessDenied);
        }
        match command {
            Command::ModuleSubscribe { addresses } => {
                let selection = AddressSelection::parse(addresses.as_deref())?;
                let current =
                    self.core
                        .subscribe_modules(self.id, &mut self.subscriptions, selection);
                Ok(json!({ "addresses": current }))
            }
            Command::ModuleUnsubscribe { addresses } => {
                let selection = AddressSelection::parse(addresses.as_deref())?;
                let removed =
                    self.core
                        .unsubscribe_modules(self.id, &mut self.subscriptions, selection);
                Ok(json!({ "addresses": removed }))
            }
            Command::MyModuleSubscribes { addresses } => {
                let current = match addresses {
                    Some(raw) => {
                        let parsed = ModuleAddress::parse_numbers(&raw)?;
                        self.core.replace_module_subscriptions(
                            self.id,
                            &mut self.subscriptions,
                            parsed,
                        )
                    }
                    None => self.subscriptions.modules(),
                };
                Ok(json!({ "addresses": current }))
            }
            Command::TopologySubscribe => {
                self.core
                    .set_topology_subscription(self.id, &mut self.subscriptions, true);
                Ok(json!({}))
            }
            Command::TopologyUnsubscribe => {
                self.core
                    .set_topology_subscription(self.id, &mut self.subscriptions, false);
                Ok(json!({}))
            }
            Command::ModuleSetConfig {
                address,
                type_code,
                name,
                config,
            } => {
                let address = ModuleAddress::from_number(&address)?;
                let mut module = self.core.set_config(
                    address,
                    ModuleUpdate {
                        type_code,
                        name,
                        config,
                    },
                )?;
                // A module recreated while still on the bus is live again.
                if !module.active {
                    self.core.reactivate(address).await?;
                    if let Ok(current) = self.core.module(address) {
                        module = current;
                    }
                }
                Ok(json!({ "module": module }))
            }
            Command::ModuleDelete { address } => {
                self.core.delete_module(ModuleAddress::from_number(&address)?);
                Ok(json!({}))
            }
            Command::Module { address } => {
                let module = self.core.module(ModuleAddress::from_number(&address)?)?;
                Ok(json!({ "module": module }))
            }
            Command::Modules => {
                let modules: Map<String, Value> = self
                    .core
                    .modules()
                    .into_iter()
                    .map(|m| (m.address.to_string(), json!(m)))
                    .collect();
                Ok(json!({ "modules": modules }))
            }
            Command::ModuleSetOutputs { address, outputs } => {
                let address = ModuleAddress::from_number(&address)?;
                let writes = outputs
                    .into_iter()
                    .map(|(port, value)| {
                        port.trim()
                            .parse::<i64>()
                            .map(|port| (port, value != 0))
                            .map_err(|_| {
                                DaemonError::InvalidRequest(format!("invalid port key {port:?}"))
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.core.set_outputs(self.id, address, &writes).await?;
                Ok(json!({}))
            }
            Command::ResetMyOutputs => {
                self.core.reset_outputs(self.id).await?;
                Ok(json!({}))
            }
            Command::Mtbusb => {
                let topology = self.core.topology();
                Ok(json!({
                    "mtbusb": {
                        "connected": self.core.bus_connected(),
                        "active_modules": topology.active_modules,
                        "scans": topology.scans,
                    }
                }))
            }
            Command::Version => Ok(json!({
                "version": { "sw_version": env!("CARGO_PKG_VERSION") }
            })),
        }
    }

    /// Return the outputs this session set to their safe values. Called on
    /// disconnect before [`close`](Self::close).
    pub async fn reset_outputs(&self) {
        if self.access == Access::ReadOnly {
            return;
        }
        if let Err(e) = self.core.reset_outputs(self.id).await {
            warn!(session = %self.id, error = %e, "Failed to reset outputs on disconnect");
        }
    }

    /// Unregister from the core. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.core.close_session(self.id);
            debug!(session = %self.id, "Session closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            warn!(session = %self.id, "Session dropped without close");
            self.close();
        }
    }
}
