//! The scan session coordinator.

use std::collections::btree_map::{BTreeMap, Entry};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::{AdvertisingOutcome, BlePlatform, DiscoveredDevice, EventRelay};

type DeviceDiscoveredCallback = Arc<dyn Fn(&DiscoveredDevice) + Send + Sync>;
type AdvertisingOutcomeCallback = Arc<dyn Fn(&AdvertisingOutcome) + Send + Sync>;

/// Whether a coordinator is scanning, and with which service filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No scan is running
    #[default]
    Idle,
    /// A scan is running
    Scanning {
        /// The filter the scan was started with. Empty when unfiltered.
        service_filter: String,
    },
}

impl SessionState {
    /// Returns `true` for [`SessionState::Scanning`].
    pub fn is_scanning(&self) -> bool {
        matches!(self, SessionState::Scanning { .. })
    }

    /// The active service filter, or `""` when idle.
    pub fn service_filter(&self) -> &str {
        match self {
            SessionState::Idle => "",
            SessionState::Scanning { service_filter } => service_filter,
        }
    }
}

/// Owns the scan session, the set of discovered peers and the application callbacks.
///
/// `Coordinator` is a handle: clones refer to the same session. When the last handle is dropped an active scan is
/// stopped before the platform is released.
///
/// All methods may be called from any thread, including from inside a registered callback.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    session: Mutex<Session>,
    on_discovered: Mutex<Option<DeviceDiscoveredCallback>>,
    on_advertising: Mutex<Option<AdvertisingOutcomeCallback>>,
}

struct Session {
    state: SessionState,
    devices: BTreeMap<String, DiscoveredDevice>,
    platform: Option<Box<dyn BlePlatform>>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.shared.session.lock();
        f.debug_struct("Coordinator")
            .field("state", &session.state)
            .field("devices", &session.devices.len())
            .field("platform", &session.platform.is_some())
            .finish()
    }
}

impl Coordinator {
    /// Creates a coordinator driving `platform` and registers it as the active target of `relay`.
    pub fn new(relay: &EventRelay, platform: Box<dyn BlePlatform>) -> Self {
        Self::build(relay, Some(platform))
    }

    /// Creates a coordinator with no platform behind it.
    ///
    /// Scans always start and stop successfully and no radio is touched. Events still arrive through `relay` or
    /// direct calls to [`on_device_discovered`][Self::on_device_discovered].
    pub fn without_platform(relay: &EventRelay) -> Self {
        Self::build(relay, None)
    }

    fn build(relay: &EventRelay, platform: Option<Box<dyn BlePlatform>>) -> Self {
        let coordinator = Coordinator {
            shared: Arc::new(Shared {
                session: Mutex::new(Session {
                    state: SessionState::Idle,
                    devices: BTreeMap::new(),
                    platform,
                }),
                on_discovered: Mutex::new(None),
                on_advertising: Mutex::new(None),
            }),
        };
        relay.register_active_coordinator(&coordinator);
        coordinator
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Coordinator { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Returns the library version.
    pub fn version() -> &'static str {
        crate::version()
    }

    /// Starts a scan session.
    ///
    /// Returns `false` without side effects if a session is already active; overlapping requests are rejected, not
    /// queued. Returns `false` and stays idle if the platform fails to start.
    pub fn start_scanning(&self, service_filter: &str, local_identifier: &str) -> bool {
        let mut session = self.shared.session.lock();
        if let SessionState::Scanning { service_filter: active } = &session.state {
            debug!("rejecting scan request, already scanning with filter {:?}", active);
            return false;
        }

        if let Some(platform) = session.platform.as_mut() {
            if let Err(err) = platform.start_ble(service_filter, local_identifier) {
                warn!("failed to start BLE: {}", err);
                return false;
            }
        }

        session.state = SessionState::Scanning {
            service_filter: service_filter.to_owned(),
        };
        info!("scanning started (filter {:?})", service_filter);
        true
    }

    /// Stops the scan session.
    ///
    /// Returns `false` without side effects when idle. If the platform fails to stop, the session stays active and
    /// `false` is returned.
    pub fn stop_scanning(&self) -> bool {
        let mut session = self.shared.session.lock();
        if !session.state.is_scanning() {
            debug!("rejecting stop request, not scanning");
            return false;
        }

        if let Some(platform) = session.platform.as_mut() {
            if let Err(err) = platform.stop_ble() {
                warn!("failed to stop BLE: {}", err);
                return false;
            }
        }

        session.state = SessionState::Idle;
        info!("scanning stopped");
        true
    }

    /// Whether a scan session is active.
    pub fn is_scanning(&self) -> bool {
        self.shared.session.lock().state.is_scanning()
    }

    /// The filter of the active session, or an empty string when idle.
    pub fn current_service_filter(&self) -> String {
        self.shared.session.lock().state.service_filter().to_owned()
    }

    /// A snapshot of the session state.
    pub fn state(&self) -> SessionState {
        self.shared.session.lock().state.clone()
    }

    /// Whether the platform reports a running native session. Always `false` without a platform.
    pub fn is_platform_active(&self) -> bool {
        let session = self.shared.session.lock();
        session.platform.as_ref().is_some_and(|platform| platform.is_active())
    }

    /// Sets the callback invoked for every discovery event, replacing any previous one.
    ///
    /// The callback runs on the thread that delivered the event, which is usually a thread owned by the OS Bluetooth
    /// stack.
    pub fn set_device_discovered_callback<F>(&self, callback: F)
    where
        F: Fn(&DiscoveredDevice) + Send + Sync + 'static,
    {
        *self.shared.on_discovered.lock() = Some(Arc::new(callback));
    }

    /// Sets the callback invoked for every advertising outcome, replacing any previous one.
    pub fn set_advertising_outcome_callback<F>(&self, callback: F)
    where
        F: Fn(&AdvertisingOutcome) + Send + Sync + 'static,
    {
        *self.shared.on_advertising.lock() = Some(Arc::new(callback));
    }

    /// Records a discovered peer and notifies the discovery callback.
    ///
    /// A peer is stored once, keyed by `identifier`, and keeps the hash of its first sighting. The callback fires for
    /// every call, repeated identifiers included.
    pub fn on_device_discovered(&self, identifier: &str, correlation_hash: Option<&str>) {
        let device = DiscoveredDevice::new(identifier, correlation_hash);

        let is_new = match self.shared.session.lock().devices.entry(device.identifier.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(device.clone());
                true
            }
            Entry::Occupied(_) => false,
        };
        trace!("device {} discovered (new: {})", identifier, is_new);

        let callback = self.shared.on_discovered.lock().clone();
        if let Some(callback) = callback {
            callback(&device);
        }
    }

    /// Forwards an advertising outcome to the advertising callback, if one is set.
    ///
    /// An empty `error_message` is treated as no message.
    pub fn on_advertising_outcome(&self, peripheral_identifier: &str, success: bool, error_message: Option<&str>) {
        let outcome = AdvertisingOutcome {
            peripheral_identifier: peripheral_identifier.to_owned(),
            success,
            error_message: error_message.filter(|msg| !msg.is_empty()).map(str::to_owned),
        };
        if success {
            debug!("advertising started as {:?}", peripheral_identifier);
        } else {
            warn!("advertising failed: {:?}", outcome.error_message);
        }

        let callback = self.shared.on_advertising.lock().clone();
        if let Some(callback) = callback {
            callback(&outcome);
        }
    }

    /// The identifiers of all peers discovered so far, in sorted order.
    ///
    /// The returned vector is a copy.
    pub fn discovered_devices(&self) -> Vec<String> {
        self.shared.session.lock().devices.keys().cloned().collect()
    }

    /// The first recorded sighting of `identifier`.
    pub fn discovered_device(&self, identifier: &str) -> Option<DiscoveredDevice> {
        self.shared.session.lock().devices.get(identifier).cloned()
    }

    /// The number of distinct peers discovered so far.
    pub fn discovered_device_count(&self) -> usize {
        self.shared.session.lock().devices.len()
    }

    /// Forgets all discovered peers. The scan session and callbacks are untouched.
    pub fn clear_discovered_devices(&self) {
        self.shared.session.lock().devices.clear();
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let session = self.session.get_mut();
        if !session.state.is_scanning() {
            return;
        }

        if let Some(platform) = session.platform.as_mut() {
            if let Err(err) = platform.stop_ble() {
                warn!("failed to stop BLE while shutting down: {}", err);
            }
        }
        session.state = SessionState::Idle;
        info!("scanning stopped on shutdown");
    }
}
