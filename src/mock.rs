//! A [`BlePlatform`] that never touches hardware.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, ErrorKind};
use crate::{BlePlatform, Result};

/// A platform that succeeds without touching the radio.
///
/// Clones share state, so a test can keep one clone to inspect calls and inject failures after boxing another into a
/// [`Coordinator`][crate::Coordinator].
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    active: bool,
    fail_start: bool,
    fail_stop: bool,
    starts: Vec<StartCall>,
    stops: usize,
}

/// The arguments of one [`BlePlatform::start_ble`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCall {
    /// The requested service filter
    pub service_filter: String,
    /// The requested local identifier
    pub local_identifier: String,
}

impl MockPlatform {
    /// Creates a mock that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent starts fail (or succeed again).
    pub fn set_fail_start(&self, fail: bool) {
        self.state.lock().fail_start = fail;
    }

    /// Makes subsequent stops fail (or succeed again).
    pub fn set_fail_stop(&self, fail: bool) {
        self.state.lock().fail_stop = fail;
    }

    /// Every start request received, failed ones included.
    pub fn start_calls(&self) -> Vec<StartCall> {
        self.state.lock().starts.clone()
    }

    /// How many stop requests were received, failed ones included.
    pub fn stop_calls(&self) -> usize {
        self.state.lock().stops
    }
}

impl BlePlatform for MockPlatform {
    fn start_ble(&mut self, service_filter: &str, local_identifier: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.starts.push(StartCall {
            service_filter: service_filter.to_owned(),
            local_identifier: local_identifier.to_owned(),
        });
        if state.fail_start {
            return Err(Error::new(ErrorKind::AdapterUnavailable, None, "mock start failure"));
        }

        debug!("mock BLE started");
        state.active = true;
        Ok(())
    }

    fn stop_ble(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.stops += 1;
        if state.fail_stop {
            return Err(Error::new(ErrorKind::Internal, None, "mock stop failure"));
        }

        debug!("mock BLE stopped");
        state.active = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.state.lock().active
    }
}
