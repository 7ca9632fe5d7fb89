use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;

use bluer::adv::{Advertisement, AdvertisementHandle, Type};
use bluer::{AdapterEvent, DiscoveryFilter, DiscoveryTransport, Session};
use futures_lite::StreamExt;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, ErrorKind};
use crate::util::{correlation_hash, parse_service_filter};
use crate::{BlePlatform, EventRelay, PlatformConfig, Result, Uuid};

/// BlueZ backed platform.
///
/// Each session runs as a task on a private runtime so that the blocking [`BlePlatform`] calls work from plain
/// threads and from inside other runtimes alike. Dropping the task ends discovery and unregisters the advertisement.
pub struct PlatformImpl {
    relay: EventRelay,
    config: PlatformConfig,
    runtime: Option<Runtime>,
    session: Option<RunningSession>,
}

struct RunningSession {
    task: JoinHandle<()>,
    relay: SessionRelay,
}

impl RunningSession {
    fn stop(self) {
        self.relay.stop();
        self.task.abort();
    }
}

/// The relay as seen by one session task.
///
/// `abort` only lands at the task's next await point, so an event read before a stop could still be forwarded.
/// Once stopped, nothing more reaches the coordinator.
#[derive(Clone)]
struct SessionRelay {
    relay: EventRelay,
    stopped: Arc<AtomicBool>,
}

impl SessionRelay {
    fn new(relay: EventRelay) -> Self {
        SessionRelay {
            relay,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn device_discovered(&self, identifier: &str, correlation_hash: Option<&str>) {
        if self.is_stopped() {
            trace!("dropping discovery of {}, session stopped", identifier);
            return;
        }
        self.relay.dispatch_device_discovered(identifier, correlation_hash);
    }

    fn advertising_outcome(&self, peripheral_identifier: &str, success: bool, error_message: Option<&str>) {
        if self.is_stopped() {
            trace!("dropping advertising outcome, session stopped");
            return;
        }
        self.relay
            .dispatch_advertising_outcome(peripheral_identifier, success, error_message);
    }
}

struct ScanRequest {
    service: Option<Uuid>,
    local_name: Option<String>,
    advertise: bool,
    duplicate_data: bool,
}

struct AdvertisingResult {
    peripheral_identifier: String,
    error: Option<String>,
}

impl PlatformImpl {
    pub fn new(relay: EventRelay, config: PlatformConfig) -> Self {
        PlatformImpl {
            relay,
            config,
            runtime: None,
            session: None,
        }
    }

    fn runtime(&mut self) -> Result<&Runtime> {
        if self.runtime.is_none() {
            let runtime = Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("passby-bluez")
                .enable_all()
                .build()
                .map_err(|err| Error::new(ErrorKind::Internal, Some(Box::new(err)), "creating BlueZ runtime"))?;
            self.runtime = Some(runtime);
        }
        self.runtime
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::Internal, None, "BlueZ runtime missing"))
    }
}

impl BlePlatform for PlatformImpl {
    fn start_ble(&mut self, service_filter: &str, local_identifier: &str) -> Result<()> {
        if self.is_active() {
            return Err(ErrorKind::AlreadyScanning.into());
        }

        let request = ScanRequest {
            service: parse_service_filter(service_filter)?,
            local_name: (!local_identifier.is_empty()).then(|| local_identifier.to_owned()),
            advertise: self.config.advertise,
            duplicate_data: self.config.allow_duplicates,
        };
        let relay = SessionRelay::new(self.relay.clone());
        let timeout = self.config.start_timeout;
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let task = self.runtime()?.spawn(run_session(request, relay.clone(), ready_tx));
        let session = RunningSession { task, relay };

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(())) => {
                info!("BlueZ session started");
                self.session = Some(session);
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(RecvTimeoutError::Timeout) => {
                session.stop();
                Err(Error::new(
                    ErrorKind::Timeout,
                    None,
                    format!("BlueZ did not start within {timeout:?}"),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::new(
                ErrorKind::Internal,
                None,
                "BlueZ session task exited before starting",
            )),
        }
    }

    fn stop_ble(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.stop();
            info!("BlueZ session stopped");
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|session| !session.task.is_finished())
    }
}

impl Drop for PlatformImpl {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
        // May run inside another runtime, where a blocking shutdown would panic.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn run_session(request: ScanRequest, relay: SessionRelay, ready: SyncSender<Result<()>>) {
    let started = async {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        if !adapter.is_powered().await? {
            return Err(Error::new(
                ErrorKind::AdapterUnavailable,
                None,
                format!("adapter {} is powered off", adapter.name()),
            ));
        }

        adapter
            .set_discovery_filter(DiscoveryFilter {
                uuids: request.service.into_iter().collect::<HashSet<_>>(),
                transport: DiscoveryTransport::Le,
                duplicate_data: request.duplicate_data,
                ..Default::default()
            })
            .await?;
        let events = adapter.discover_devices().await?;
        debug!("discovering on {}", adapter.name());

        let (advertisement, outcome) = if request.advertise {
            let (handle, outcome) = advertise(&adapter, &request).await;
            (handle, Some(outcome))
        } else {
            (None, None)
        };

        Ok::<_, Error>((session, adapter, events, advertisement, outcome))
    }
    .await;

    let (_session, adapter, events, _advertisement, outcome) = match started {
        Ok(started) => started,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    // The caller holds the coordinator lock until it hears back, so nothing may reach the relay before this.
    let _ = ready.send(Ok(()));

    if let Some(outcome) = outcome {
        relay.advertising_outcome(
            &outcome.peripheral_identifier,
            outcome.error.is_none(),
            outcome.error.as_deref(),
        );
    }

    let mut events = Box::pin(events);
    while let Some(event) = events.next().await {
        if relay.is_stopped() {
            break;
        }
        if let AdapterEvent::DeviceAdded(addr) = event {
            let hash = match adapter.device(addr) {
                Ok(device) => match device.manufacturer_data().await {
                    Ok(Some(data)) => correlation_hash(data.iter().map(|(id, payload)| (*id, payload.as_slice()))),
                    Ok(None) => None,
                    Err(err) => {
                        debug!("reading manufacturer data of {} failed: {}", addr, err);
                        None
                    }
                },
                Err(err) => {
                    debug!("opening device {} failed: {}", addr, err);
                    None
                }
            };
            relay.device_discovered(&addr.to_string(), hash.as_deref());
        }
    }

    if !relay.is_stopped() {
        warn!("BlueZ discovery stream ended");
    }
}

async fn advertise(adapter: &bluer::Adapter, request: &ScanRequest) -> (Option<AdvertisementHandle>, AdvertisingResult) {
    let peripheral_identifier = adapter.address().await.map(|addr| addr.to_string()).unwrap_or_default();
    let advertisement = Advertisement {
        advertisement_type: Type::Peripheral,
        service_uuids: request.service.into_iter().collect::<BTreeSet<_>>(),
        local_name: request.local_name.clone(),
        discoverable: Some(true),
        ..Default::default()
    };

    match adapter.advertise(advertisement).await {
        Ok(handle) => (
            Some(handle),
            AdvertisingResult {
                peripheral_identifier,
                error: None,
            },
        ),
        Err(err) => {
            warn!("registering advertisement failed: {}", err);
            (
                None,
                AdvertisingResult {
                    peripheral_identifier,
                    error: Some(err.to_string()),
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Coordinator;

    #[test]
    fn stopped_session_forwards_nothing() {
        let relay = EventRelay::new();
        let coordinator = Coordinator::without_platform(&relay);
        let session = SessionRelay::new(relay.clone());

        session.device_discovered("00:11:22:33:44:55", Some("0a"));
        assert_eq!(coordinator.discovered_devices(), vec!["00:11:22:33:44:55"]);

        let outcomes = Arc::new(parking_lot::Mutex::new(0));
        let sink = Arc::clone(&outcomes);
        coordinator.set_advertising_outcome_callback(move |_| *sink.lock() += 1);

        session.clone().stop();
        assert!(session.is_stopped());
        session.device_discovered("66:77:88:99:AA:BB", None);
        session.advertising_outcome("00:11:22:33:44:55", true, None);

        assert_eq!(coordinator.discovered_device_count(), 1);
        assert_eq!(*outcomes.lock(), 0);

        // other sessions on the same relay are unaffected
        SessionRelay::new(relay).device_discovered("66:77:88:99:AA:BB", None);
        assert_eq!(coordinator.discovered_device_count(), 2);
    }
}
