//! The capability boundary between the coordinator and the OS Bluetooth stack.

use std::time::Duration;

use crate::{EventRelay, Result};

/// Platform-specific BLE operations.
///
/// Implementations deliver asynchronous native events (peers discovered, advertising started or failed) through the
/// [`EventRelay`] they were created with, never through a direct reference to a coordinator.
pub trait BlePlatform: Send {
    /// Starts scanning, and advertising where the platform supports it.
    ///
    /// An empty `service_filter` discovers every advertising peer. `local_identifier` is what this device advertises
    /// itself as; it may be empty.
    fn start_ble(&mut self, service_filter: &str, local_identifier: &str) -> Result<()>;

    /// Stops scanning and advertising.
    fn stop_ble(&mut self) -> Result<()>;

    /// Whether a native session is currently running.
    fn is_active(&self) -> bool;
}

/// Settings for the system [`BlePlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlatformConfig {
    /// Advertise this device while scanning
    pub advertise: bool,
    /// Ask the radio to report repeated advertisements from the same peer
    pub allow_duplicates: bool,
    /// How long to wait for the native stack to confirm that a session started
    pub start_timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig {
            advertise: true,
            allow_duplicates: false,
            start_timeout: Duration::from_secs(10),
        }
    }
}

/// Creates the [`BlePlatform`] compiled in for the current target, with default settings.
///
/// Native events are routed through `relay`.
pub fn create_platform(relay: &EventRelay) -> Box<dyn BlePlatform> {
    create_platform_with_config(relay, PlatformConfig::default())
}

/// Creates the [`BlePlatform`] compiled in for the current target.
#[cfg(feature = "mock")]
pub fn create_platform_with_config(_relay: &EventRelay, _config: PlatformConfig) -> Box<dyn BlePlatform> {
    Box::new(crate::mock::MockPlatform::new())
}

/// Creates the [`BlePlatform`] compiled in for the current target.
#[cfg(not(feature = "mock"))]
pub fn create_platform_with_config(relay: &EventRelay, config: PlatformConfig) -> Box<dyn BlePlatform> {
    Box::new(sys::PlatformImpl::new(relay.clone(), config))
}

#[cfg(all(not(feature = "mock"), target_os = "linux"))]
use crate::bluer::platform as sys;
#[cfg(all(not(feature = "mock"), any(target_os = "macos", target_os = "ios")))]
use crate::corebluetooth::platform as sys;
#[cfg(all(not(feature = "mock"), not(any(target_os = "linux", target_os = "macos", target_os = "ios"))))]
use crate::unsupported as sys;
