//! Routing of native BLE events to the active coordinator.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::trace;

use crate::coordinator::{Coordinator, Shared};

/// Forwards native discovery and advertising events to the currently registered [`Coordinator`].
///
/// Native delegate callbacks arrive on threads owned by the OS Bluetooth stack and have no handle to a specific
/// coordinator. Platforms are handed a clone of the relay instead; whichever coordinator registered last receives
/// their events. The relay holds only a weak reference, so it never keeps a coordinator alive, and dispatching with
/// no live coordinator is a no-op.
///
/// Clones share the same registration.
#[derive(Clone, Default)]
pub struct EventRelay {
    active: Arc<RwLock<Weak<Shared>>>,
}

impl std::fmt::Debug for EventRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRelay")
            .field("registered", &(self.active.read().strong_count() > 0))
            .finish()
    }
}

impl EventRelay {
    /// Creates a relay with no coordinator registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `coordinator` the target of all further events, replacing any previous registration.
    pub fn register_active_coordinator(&self, coordinator: &Coordinator) {
        *self.active.write() = Arc::downgrade(coordinator.shared());
    }

    /// The registered coordinator, if it is still alive.
    pub fn active_coordinator(&self) -> Option<Coordinator> {
        self.active.read().upgrade().map(Coordinator::from_shared)
    }

    /// Delivers a discovery event to the active coordinator.
    pub fn dispatch_device_discovered(&self, identifier: &str, correlation_hash: Option<&str>) {
        match self.active_coordinator() {
            Some(coordinator) => coordinator.on_device_discovered(identifier, correlation_hash),
            None => trace!("dropping discovery of {}, no active coordinator", identifier),
        }
    }

    /// Delivers an advertising outcome to the active coordinator.
    pub fn dispatch_advertising_outcome(&self, peripheral_identifier: &str, success: bool, error_message: Option<&str>) {
        match self.active_coordinator() {
            Some(coordinator) => coordinator.on_advertising_outcome(peripheral_identifier, success, error_message),
            None => trace!("dropping advertising outcome, no active coordinator"),
        }
    }
}
