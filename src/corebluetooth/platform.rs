use std::sync::Arc;

use objc2::rc::Retained;
use objc2::runtime::{AnyObject, ProtocolObject};
use objc2::AnyThread;
use objc2_core_bluetooth::{
    CBAdvertisementDataLocalNameKey, CBAdvertisementDataManufacturerDataKey, CBAdvertisementDataServiceUUIDsKey,
    CBCentralManager, CBCentralManagerScanOptionAllowDuplicatesKey, CBManager, CBManagerAuthorization,
    CBManagerState, CBPeripheral, CBPeripheralManager, CBUUID,
};
use objc2_foundation::{NSArray, NSData, NSDictionary, NSMutableDictionary, NSNumber, NSString};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use super::delegates::{CentralDelegate, PeripheralManagerDelegate};
use super::dispatch::{queue, Dispatched};
use crate::error::{Error, ErrorKind};
use crate::util::{correlation_hash, parse_service_filter};
use crate::{BlePlatform, EventRelay, PlatformConfig, Result, Uuid};

const NOT_AVAILABLE: &str = "Bluetooth not available";

/// CoreBluetooth backed platform.
///
/// A central manager scans and a peripheral manager advertises. Both are created on first start and share one serial
/// dispatch queue with their delegates. Work is queued asynchronously, and scanning or advertising begins as soon as
/// the radio reports that it is powered on.
pub struct PlatformImpl {
    shared: Arc<Shared>,
    managers: Option<Managers>,
}

/// State shared with the delegates.
pub(super) struct Shared {
    relay: EventRelay,
    config: PlatformConfig,
    request: Mutex<Option<ScanRequest>>,
}

#[derive(Debug, Clone)]
struct ScanRequest {
    service: Option<Uuid>,
    local_name: Option<String>,
}

struct Managers {
    central: Arc<Dispatched<CBCentralManager>>,
    peripheral: Arc<Dispatched<CBPeripheralManager>>,
    // The managers only hold their delegates weakly.
    _central_delegate: Dispatched<CentralDelegate>,
    _peripheral_delegate: Dispatched<PeripheralManagerDelegate>,
}

impl Shared {
    fn request(&self) -> Option<ScanRequest> {
        self.request.lock().clone()
    }

    fn advertised_identifier(request: &ScanRequest) -> &str {
        request.local_name.as_deref().unwrap_or_default()
    }
}

impl Managers {
    fn new(shared: &Arc<Shared>) -> Self {
        let central_delegate = CentralDelegate::new(Arc::clone(shared));
        let peripheral_delegate = PeripheralManagerDelegate::new(Arc::clone(shared));

        let central = unsafe {
            CBCentralManager::initWithDelegate_queue(
                CBCentralManager::alloc(),
                Some(ProtocolObject::from_ref(&*central_delegate)),
                Some(queue()),
            )
        };
        let peripheral = unsafe {
            CBPeripheralManager::initWithDelegate_queue(
                CBPeripheralManager::alloc(),
                Some(ProtocolObject::from_ref(&*peripheral_delegate)),
                Some(queue()),
            )
        };

        // SAFETY: from here on the managers and delegates are only touched from the queue, either by CoreBluetooth
        // itself or through `Dispatched::dispatch_async`.
        unsafe {
            Managers {
                central: Arc::new(Dispatched::new(central)),
                peripheral: Arc::new(Dispatched::new(peripheral)),
                _central_delegate: Dispatched::new(central_delegate),
                _peripheral_delegate: Dispatched::new(peripheral_delegate),
            }
        }
    }
}

impl PlatformImpl {
    pub fn new(relay: EventRelay, config: PlatformConfig) -> Self {
        PlatformImpl {
            shared: Arc::new(Shared {
                relay,
                config,
                request: Mutex::new(None),
            }),
            managers: None,
        }
    }
}

impl BlePlatform for PlatformImpl {
    fn start_ble(&mut self, service_filter: &str, local_identifier: &str) -> Result<()> {
        if self.is_active() {
            return Err(ErrorKind::AlreadyScanning.into());
        }

        let service = parse_service_filter(service_filter)?;
        match unsafe { CBManager::authorization_class() } {
            CBManagerAuthorization::AllowedAlways => info!("Bluetooth authorization is allowed"),
            CBManagerAuthorization::NotDetermined => warn!("Bluetooth authorization is undetermined"),
            CBManagerAuthorization::Denied | CBManagerAuthorization::Restricted => {
                error!("Bluetooth authorization is denied");
                return Err(Error::new(
                    ErrorKind::NotAuthorized,
                    None,
                    "Bluetooth access is not authorized",
                ));
            }
            val => error!("Bluetooth authorization returned unknown value {:?}", val),
        }

        *self.shared.request.lock() = Some(ScanRequest {
            service,
            local_name: (!local_identifier.is_empty()).then(|| local_identifier.to_owned()),
        });

        let shared = Arc::clone(&self.shared);
        let managers = self.managers.get_or_insert_with(|| Managers::new(&shared));

        let scan_shared = Arc::clone(&shared);
        managers.central.dispatch_async(move |central| scan_if_ready(central, &scan_shared));
        managers
            .peripheral
            .dispatch_async(move |peripheral| advertise_if_ready(peripheral, &shared));

        info!("CoreBluetooth session requested");
        Ok(())
    }

    fn stop_ble(&mut self) -> Result<()> {
        self.shared.request.lock().take();

        if let Some(managers) = &self.managers {
            managers.central.dispatch_async(|central| unsafe { central.stopScan() });
            managers
                .peripheral
                .dispatch_async(|peripheral| unsafe { peripheral.stopAdvertising() });
        }

        info!("CoreBluetooth session stopped");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.shared.request.lock().is_some()
    }
}

impl Drop for PlatformImpl {
    fn drop(&mut self) {
        let _ = self.stop_ble();
    }
}

pub(super) fn central_state_changed(central: &CBCentralManager, shared: &Shared) {
    let state = unsafe { central.state() };
    debug!("Central state is now {:?}", state);
    scan_if_ready(central, shared);
}

fn scan_if_ready(central: &CBCentralManager, shared: &Shared) {
    let Some(request) = shared.request() else {
        return;
    };
    if unsafe { central.state() } != CBManagerState::PoweredOn {
        debug!("deferring scan until the central is powered on");
        return;
    }

    let services = request.service.map(|uuid| NSArray::from_retained_slice(&[cbuuid(uuid)]));
    let options = NSMutableDictionary::<NSString, AnyObject>::new();
    if shared.config.allow_duplicates {
        unsafe {
            options.setValue_forKey(
                Some(&NSNumber::new_bool(true)),
                CBCentralManagerScanOptionAllowDuplicatesKey,
            );
        }
    }

    unsafe {
        central.scanForPeripheralsWithServices_options(services.as_deref(), Some(&options));
    }
    debug!("scanning for {:?}", request.service);
}

pub(super) fn advertise_if_ready(peripheral: &CBPeripheralManager, shared: &Shared) {
    if !shared.config.advertise {
        return;
    }
    let Some(request) = shared.request() else {
        return;
    };

    let state = unsafe { peripheral.state() };
    debug!("Peripheral manager state is now {:?}", state);
    match state {
        CBManagerState::PoweredOn => {}
        CBManagerState::Unsupported | CBManagerState::Unauthorized | CBManagerState::PoweredOff => {
            shared.relay.dispatch_advertising_outcome(
                Shared::advertised_identifier(&request),
                false,
                Some(NOT_AVAILABLE),
            );
            return;
        }
        _ => return,
    }
    if unsafe { peripheral.isAdvertising() } {
        return;
    }

    let data = NSMutableDictionary::<NSString, AnyObject>::new();
    if let Some(uuid) = request.service {
        let services = NSArray::from_retained_slice(&[cbuuid(uuid)]);
        unsafe { data.setValue_forKey(Some(&services), CBAdvertisementDataServiceUUIDsKey) };
    }
    if let Some(name) = &request.local_name {
        unsafe { data.setValue_forKey(Some(&NSString::from_str(name)), CBAdvertisementDataLocalNameKey) };
    }

    unsafe { peripheral.startAdvertising(Some(&data)) };
}

pub(super) fn advertising_started(error: Option<String>, shared: &Shared) {
    let Some(request) = shared.request() else {
        return;
    };
    shared.relay.dispatch_advertising_outcome(
        Shared::advertised_identifier(&request),
        error.is_none(),
        error.as_deref(),
    );
}

pub(super) fn peripheral_discovered(
    peripheral: &CBPeripheral,
    advertisement_data: &NSDictionary<NSString, AnyObject>,
    shared: &Shared,
) {
    if shared.request.lock().is_none() {
        return;
    }

    let identifier = unsafe { peripheral.identifier().UUIDString() }.to_string();
    let hash = manufacturer_hash(advertisement_data);
    trace!("CentralDelegate discovered {}", identifier);
    shared.relay.dispatch_device_discovered(&identifier, hash.as_deref());
}

fn manufacturer_hash(advertisement_data: &NSDictionary<NSString, AnyObject>) -> Option<String> {
    let value = advertisement_data.objectForKey(unsafe { CBAdvertisementDataManufacturerDataKey })?;
    let bytes = value.downcast_ref::<NSData>()?.to_vec();
    if bytes.len() < 2 {
        return None;
    }
    let company_id = u16::from_le_bytes([bytes[0], bytes[1]]);
    correlation_hash([(company_id, &bytes[2..])])
}

fn cbuuid(uuid: Uuid) -> Retained<CBUUID> {
    unsafe { CBUUID::UUIDWithString(&NSString::from_str(&uuid.to_string())) }
}
