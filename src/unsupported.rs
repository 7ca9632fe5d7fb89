use tracing::warn;

use crate::error::{Error, ErrorKind};
use crate::{BlePlatform, EventRelay, PlatformConfig, Result};

/// Used on targets without a BLE backend. Every start fails.
pub struct PlatformImpl;

impl PlatformImpl {
    pub fn new(_relay: EventRelay, _config: PlatformConfig) -> Self {
        warn!("no BLE backend for this target, scanning will fail");
        PlatformImpl
    }
}

impl BlePlatform for PlatformImpl {
    fn start_ble(&mut self, _service_filter: &str, _local_identifier: &str) -> Result<()> {
        Err(Error::new(
            ErrorKind::NotSupported,
            None,
            "BLE is not supported on this platform",
        ))
    }

    fn stop_ble(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_active(&self) -> bool {
        false
    }
}
