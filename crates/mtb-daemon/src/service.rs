//! # Daemon Core
//!
//! Single owner of the module registry, the topology store and the event
//! dispatcher. One mutex serializes every mutation together with the fan-out
//! of the events it produced, so an observer can never see a new registry
//! value without its event being queued, and a subscription added
//! concurrently with a change either sees that change or does not.
//!
//! Nothing inside the lock awaits. Bus writes happen after it is released
//! and come back as [`BusNotification`]s.
//!
//! The core also remembers which session last set each output. Those
//! outputs go back to their safe values when the session resets them or
//! disconnects.

use crate::domain::{
    AddressSelection, DaemonError, ModuleRegistry, ModuleSeed, ModuleUpdate, OutputSetters,
    SubscriptionSet, TopologySnapshot, TopologyStore,
};
use crate::ports::{BusDriver, BusError, BusNotification, BusNotifications};
use mtb_bus::{EventDispatcher, EventPublisher, EventQueue, ModuleEvent, SessionId};
use mtb_types::{ModuleAddress, ModuleView};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct CoreState {
    registry: ModuleRegistry,
    topology: TopologyStore,
    dispatcher: EventDispatcher,
    setters: OutputSetters,
}

impl CoreState {
    fn publish(&mut self, events: Vec<ModuleEvent>) {
        for event in &events {
            self.dispatcher.publish(event);
        }
    }

    fn activate(&mut self, address: ModuleAddress, type_code: u8) {
        self.topology.activate(address);
        let events = self.registry.activate(address, type_code);
        self.publish(events);
    }

    fn deactivate(&mut self, address: ModuleAddress) {
        self.topology.deactivate(address);
        let events = self.registry.deactivate(address);
        self.publish(events);
    }
}

/// Shared state engine of the daemon.
pub struct DaemonCore {
    state: Mutex<CoreState>,
    bus: Arc<dyn BusDriver>,
    next_session: AtomicU64,
}

impl DaemonCore {
    pub fn new(bus: Arc<dyn BusDriver>, queue_capacity: usize) -> Self {
        Self {
            state: Mutex::new(CoreState {
                registry: ModuleRegistry::new(),
                topology: TopologyStore::new(),
                dispatcher: EventDispatcher::with_capacity(queue_capacity),
                setters: OutputSetters::new(),
            }),
            bus,
            next_session: AtomicU64::new(1),
        }
    }

    /// Load modules from the config file.
    pub fn seed<'a>(
        &self,
        seeds: impl IntoIterator<Item = (ModuleAddress, &'a ModuleSeed)>,
    ) -> Result<(), DaemonError> {
        for (address, seed) in seeds {
            self.set_config(
                address,
                ModuleUpdate {
                    type_code: Some(seed.type_code),
                    name: Some(seed.name.clone()),
                    config: seed.config.clone(),
                },
            )?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Sessions and subscriptions
    // -------------------------------------------------------------------------

    /// Register a new client session.
    pub fn open_session(&self) -> (SessionId, EventQueue) {
        let session = SessionId::new(self.next_session.fetch_add(1, Ordering::SeqCst));
        let queue = self.state.lock().dispatcher.register(session);
        (session, queue)
    }

    /// Unregister a session. Once this returns, no further event is queued
    /// for it. Outputs it still owns keep their values.
    pub fn close_session(&self, session: SessionId) {
        let mut state = self.state.lock();
        state.dispatcher.unregister(session);
        state.setters.take_session(session);
    }

    /// Whether the dispatcher still serves `session`.
    pub fn is_session_open(&self, session: SessionId) -> bool {
        self.state.lock().dispatcher.is_registered(session)
    }

    /// Returns the full subscription set after the addition.
    pub fn subscribe_modules(
        &self,
        session: SessionId,
        subscriptions: &mut SubscriptionSet,
        selection: AddressSelection,
    ) -> Vec<ModuleAddress> {
        let mut state = self.state.lock();
        let added = subscriptions.subscribe_modules(selection);
        state.dispatcher.subscribe_modules(session, &added);
        debug!(session = %session, added = added.len(), "Module subscriptions added");
        subscriptions.modules()
    }

    /// Returns the addresses actually removed.
    pub fn unsubscribe_modules(
        &self,
        session: SessionId,
        subscriptions: &mut SubscriptionSet,
        selection: AddressSelection,
    ) -> Vec<ModuleAddress> {
        let mut state = self.state.lock();
        let removed = subscriptions.unsubscribe_modules(selection);
        state.dispatcher.unsubscribe_modules(session, &removed);
        debug!(session = %session, removed = removed.len(), "Module subscriptions removed");
        removed
    }

    /// Returns the new subscription set.
    pub fn replace_module_subscriptions(
        &self,
        session: SessionId,
        subscriptions: &mut SubscriptionSet,
        addresses: Vec<ModuleAddress>,
    ) -> Vec<ModuleAddress> {
        let mut state = self.state.lock();
        let replacement = subscriptions.replace_modules(addresses);
        state.dispatcher.unsubscribe_modules(session, &replacement.removed);
        state.dispatcher.subscribe_modules(session, &replacement.added);
        subscriptions.modules()
    }

    pub fn set_topology_subscription(
        &self,
        session: SessionId,
        subscriptions: &mut SubscriptionSet,
        subscribed: bool,
    ) {
        let mut state = self.state.lock();
        if subscriptions.set_topology(subscribed) {
            state.dispatcher.set_topology(session, subscribed);
            debug!(session = %session, subscribed = subscribed, "Topology subscription changed");
        }
    }

    // -------------------------------------------------------------------------
    // Module state
    // -------------------------------------------------------------------------

    /// Create or edit a module and notify its subscribers.
    pub fn set_config(
        &self,
        address: ModuleAddress,
        update: ModuleUpdate,
    ) -> Result<ModuleView, DaemonError> {
        let mut state = self.state.lock();
        let (view, events) = state.registry.set_config(address, update)?;
        if !events.is_empty() {
            info!(address = %address, name = %view.name, "Module configuration changed");
        }
        state.publish(events);
        Ok(view)
    }

    /// Delete a module. The deletion is announced even for an empty slot.
    pub fn delete_module(&self, address: ModuleAddress) {
        let mut state = self.state.lock();
        state.topology.deactivate(address);
        state.setters.forget_module(address);
        let events = state.registry.delete(address);
        info!(address = %address, "Module deleted");
        state.publish(events);
    }

    pub fn module(&self, address: ModuleAddress) -> Result<ModuleView, DaemonError> {
        self.state
            .lock()
            .registry
            .module(address)
            .ok_or(DaemonError::ModuleNotFound(address))
    }

    /// All modules, ascending by address.
    pub fn modules(&self) -> Vec<ModuleView> {
        self.state.lock().registry.modules()
    }

    pub fn topology(&self) -> TopologySnapshot {
        self.state.lock().topology.snapshot()
    }

    pub fn bus_connected(&self) -> bool {
        self.bus.is_connected()
    }

    /// Ask the bus to set outputs of an active module on behalf of
    /// `session`, which becomes the owner of the written ports.
    ///
    /// Registry state changes only when the bus confirms the write.
    ///
    /// # Errors
    /// - `ModuleNotFound`: no module at the address
    /// - `ModuleFailed`: module is not present on the bus
    /// - `InvalidPort`: port beyond the module's output count
    pub async fn set_outputs(
        &self,
        session: SessionId,
        address: ModuleAddress,
        outputs: &[(i64, bool)],
    ) -> Result<(), DaemonError> {
        let writes = {
            let state = self.state.lock();
            let module = state
                .registry
                .get(address)
                .ok_or(DaemonError::ModuleNotFound(address))?;
            if !module.active {
                return Err(DaemonError::ModuleFailed(address));
            }
            outputs
                .iter()
                .map(|&(port, value)| {
                    u8::try_from(port)
                        .ok()
                        .filter(|p| usize::from(*p) < module.outputs.len())
                        .map(|p| (p, value))
                        .ok_or(DaemonError::InvalidPort { address, port })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        self.bus
            .write_outputs(address, &writes)
            .await
            .map_err(bus_error)?;
        self.state
            .lock()
            .setters
            .record(session, address, writes.iter().map(|&(port, _)| port));
        Ok(())
    }

    /// Return every output owned by `session` to its safe value.
    ///
    /// Ownership is released even for modules that are not on the bus; their
    /// outputs are left alone. Every module is attempted and the first bus
    /// error is returned. Returns the number of ports written.
    pub async fn reset_outputs(&self, session: SessionId) -> Result<usize, DaemonError> {
        let resets: Vec<(ModuleAddress, Vec<(u8, bool)>)> = {
            let mut state = self.state.lock();
            let owned = state.setters.take_session(session);
            owned
                .into_iter()
                .filter_map(|(address, ports)| {
                    let module = state.registry.get(address).filter(|m| m.active)?;
                    let writes: Vec<_> = ports
                        .into_iter()
                        .filter(|port| usize::from(*port) < module.outputs.len())
                        .map(|port| (port, module.safe_output(port)))
                        .collect();
                    (!writes.is_empty()).then_some((address, writes))
                })
                .collect()
        };

        let mut written = 0;
        let mut first_error = None;
        for (address, writes) in resets {
            match self.bus.write_outputs(address, &writes).await {
                Ok(()) => written += writes.len(),
                Err(e) => {
                    warn!(session = %session, address = %address, error = %e, "Output reset failed");
                    if first_error.is_none() {
                        first_error = Some(bus_error(e));
                    }
                }
            }
        }
        if written > 0 {
            info!(session = %session, ports = written, "Outputs reset to safe values");
        }
        first_error.map_or(Ok(written), Err)
    }

    // -------------------------------------------------------------------------
    // Reactivation
    // -------------------------------------------------------------------------

    /// Ask the bus whether an inactive module answers again and mark it
    /// active if it does.
    ///
    /// Returns `false` when the module is unknown, already active or silent.
    pub async fn reactivate(&self, address: ModuleAddress) -> Result<bool, DaemonError> {
        if !self.is_inactive(address) {
            return Ok(false);
        }
        let type_code = match self.bus.identify(address).await {
            Ok(type_code) => type_code,
            Err(BusError::NoResponse(_)) => return Ok(false),
            Err(e) => return Err(bus_error(e)),
        };

        let mut state = self.state.lock();
        // Deleted or discovered while the bus was answering.
        if !state.registry.get(address).is_some_and(|m| !m.active) {
            return Ok(false);
        }
        info!(address = %address, type_code = type_code, "Module reactivated");
        state.activate(address, type_code);
        Ok(true)
    }

    /// One pass of [`reactivate`](Self::reactivate) over every inactive
    /// module. Returns how many came back.
    pub async fn reactivate_inactive(&self) -> usize {
        let inactive = self.state.lock().registry.inactive();
        let mut reactivated = 0;
        for address in inactive {
            match self.reactivate(address).await {
                Ok(true) => reactivated += 1,
                Ok(false) => {}
                Err(e) => {
                    debug!(error = %e, "Reactivation pass aborted");
                    break;
                }
            }
        }
        reactivated
    }

    /// Periodically reactivate inactive modules until `shutdown` flips.
    pub async fn run_reactivation(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.reactivate_inactive().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Reactivation task stopped");
    }

    fn is_inactive(&self, address: ModuleAddress) -> bool {
        self.state
            .lock()
            .registry
            .get(address)
            .is_some_and(|m| !m.active)
    }

    // -------------------------------------------------------------------------
    // Bus driver path
    // -------------------------------------------------------------------------

    /// Apply one notification from the bus driver.
    pub fn apply_bus_notification(&self, notification: BusNotification) {
        let mut state = self.state.lock();
        match notification {
            BusNotification::ModuleDiscovered { address, type_code } => {
                info!(address = %address, type_code = type_code, "Module discovered");
                state.activate(address, type_code);
            }
            BusNotification::ModuleFailed { address } => {
                info!(address = %address, "Module failed");
                state.deactivate(address);
            }
            BusNotification::InputChanged {
                address,
                port,
                value,
            } => {
                let event = state.registry.apply_input(address, port, value);
                state.publish(event.into_iter().collect());
            }
            BusNotification::OutputChanged {
                address,
                port,
                value,
            } => {
                let event = state.registry.set_output(address, port, value);
                state.publish(event.into_iter().collect());
            }
            BusNotification::ScanCompleted { modules } => {
                let found: BTreeSet<_> = modules.iter().map(|(addr, _)| *addr).collect();
                let diff = state.topology.apply_scan(&found);
                info!(
                    found = found.len(),
                    appeared = diff.appeared.len(),
                    disappeared = diff.disappeared.len(),
                    "Bus scan completed"
                );
                for (address, type_code) in modules {
                    if diff.appeared.contains(&address) {
                        state.activate(address, type_code);
                    }
                }
                for address in diff.disappeared {
                    state.deactivate(address);
                }
            }
        }
    }

    /// Drain bus notifications until every driver handle is dropped.
    pub async fn run_bus_pump(self: Arc<Self>, mut notifications: BusNotifications) {
        while let Some(notification) = notifications.recv().await {
            self.apply_bus_notification(notification);
        }
        info!("Bus notification channel closed");
    }
}

fn bus_error(e: BusError) -> DaemonError {
    match e {
        BusError::AlreadyWriting(addr) => DaemonError::ModuleAlreadyWriting(addr),
        other => DaemonError::BusUnavailable(other.to_string()),
    }
}
