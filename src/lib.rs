#![warn(missing_docs)]

//! PassBy answers one question for mobile and desktop apps: *is another instance of this app nearby?* It scans for
//! [Bluetooth Low Energy] peers (and, where the platform allows it, advertises at the same time), deduplicates the
//! peers it sees, and hands discovery and advertising events to application callbacks.
//!
//! [Bluetooth Low Energy]: https://www.bluetooth.com/specifications/specs/
//!
//! # Usage
//!
//! ```rust,no_run
//!# use passby::{create_platform, Coordinator, EventRelay};
//!let relay = EventRelay::new();
//!let coordinator = Coordinator::new(&relay, create_platform(&relay));
//!
//!coordinator.set_device_discovered_callback(|device| {
//!    println!("found {} ({:?})", device.identifier, device.correlation_hash);
//!});
//!
//!if coordinator.start_scanning("", "my-phone") {
//!    std::thread::sleep(std::time::Duration::from_secs(10));
//!    coordinator.stop_scanning();
//!}
//!println!("{} peers nearby", coordinator.discovered_device_count());
//! ```
//!
//! # Overview
//!
//! - [`Coordinator`] owns the scan session. At most one session is active at a time; a second
//!   [`start_scanning`][Coordinator::start_scanning] is rejected until [`stop_scanning`][Coordinator::stop_scanning].
//! - [`EventRelay`] is the indirection native BLE callbacks use to reach whichever coordinator is currently
//!   registered. It only holds a weak reference.
//! - [`BlePlatform`] is the capability boundary to the OS Bluetooth stack. [`create_platform`] picks the
//!   implementation compiled in for the target.
//!
//! # Platform specifics
//!
//! ## Linux (BlueZ)
//!
//! The backend talks to `bluetoothd` over D-Bus through a private Tokio runtime, so the coordinator can be driven
//! from plain threads or from inside another runtime. Advertising registers an LE advertisement with BlueZ.
//!
//! ## MacOS/iOS (CoreBluetooth)
//!
//! Scanning and advertising start once CoreBluetooth reports the radio as powered on. The identifier reported for
//! discovered peers is the CoreBluetooth peripheral UUID, which is stable per device pair but differs between
//! observers.
//!
//! ## Other targets
//!
//! Starting a scan fails with [`ErrorKind::NotSupported`][error::ErrorKind::NotSupported].
//!
//! # Feature flags
//!
//! - `serde`: serialize/deserialize [`DiscoveredDevice`], [`AdvertisingOutcome`] and [`PlatformConfig`].
//! - `mock`: make [`create_platform`] return [`mock::MockPlatform`] on every target.

pub mod coordinator;
pub mod error;
pub mod mock;
pub mod platform;
pub mod relay;
mod util;

#[cfg(target_os = "linux")]
#[cfg_attr(feature = "mock", allow(dead_code))]
mod bluer;
#[cfg(any(target_os = "macos", target_os = "ios"))]
#[cfg_attr(feature = "mock", allow(dead_code))]
mod corebluetooth;
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
#[cfg_attr(feature = "mock", allow(dead_code))]
mod unsupported;

#[cfg(target_os = "linux")]
pub use ::bluer::Uuid;
pub use coordinator::{Coordinator, SessionState};
pub use error::Error;
pub use platform::{create_platform, create_platform_with_config, BlePlatform, PlatformConfig};
pub use relay::EventRelay;
#[cfg(not(target_os = "linux"))]
pub use uuid::Uuid;

/// Convenience alias for a result with [`Error`]
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version.
pub fn version() -> &'static str {
    VERSION
}

/// A peer seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredDevice {
    /// The platform-assigned peripheral identifier. Unique per peer.
    pub identifier: String,
    /// Opaque token derived from the peer's manufacturer data. Never interpreted by PassBy.
    pub correlation_hash: Option<String>,
}

impl DiscoveredDevice {
    /// Creates a device record.
    pub fn new(identifier: &str, correlation_hash: Option<&str>) -> Self {
        DiscoveredDevice {
            identifier: identifier.to_owned(),
            correlation_hash: correlation_hash.map(str::to_owned),
        }
    }
}

/// The result of asking the platform to advertise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvertisingOutcome {
    /// Identifier of the local peripheral that advertises. May be empty when the platform does not expose one.
    pub peripheral_identifier: String,
    /// Whether advertising started
    pub success: bool,
    /// Why advertising failed, when it did
    pub error_message: Option<String>,
}
