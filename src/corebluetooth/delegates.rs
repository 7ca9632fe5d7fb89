use std::sync::Arc;

use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2::{define_class, msg_send, AnyThread, DefinedClass};
use objc2_core_bluetooth::{
    CBCentralManager, CBCentralManagerDelegate, CBPeripheral, CBPeripheralManager, CBPeripheralManagerDelegate,
};
use objc2_foundation::{NSDictionary, NSError, NSNumber, NSObject, NSObjectProtocol, NSString};
use tracing::debug;

use super::platform::{self, Shared};

pub(super) struct DelegateIvars {
    shared: Arc<Shared>,
}

define_class!(
    #[unsafe(super(NSObject))]
    #[name = "PassByCentralDelegate"]
    #[ivars = DelegateIvars]
    pub(super) struct CentralDelegate;

    unsafe impl NSObjectProtocol for CentralDelegate {}

    #[allow(non_snake_case)]
    unsafe impl CBCentralManagerDelegate for CentralDelegate {
        #[unsafe(method(centralManagerDidUpdateState:))]
        fn centralManagerDidUpdateState(&self, central: &CBCentralManager) {
            platform::central_state_changed(central, &self.ivars().shared);
        }

        #[unsafe(method(centralManager:didDiscoverPeripheral:advertisementData:RSSI:))]
        fn centralManager_didDiscoverPeripheral_advertisementData_RSSI(
            &self,
            _central: &CBCentralManager,
            peripheral: &CBPeripheral,
            advertisement_data: &NSDictionary<NSString, AnyObject>,
            _rssi: &NSNumber,
        ) {
            platform::peripheral_discovered(peripheral, advertisement_data, &self.ivars().shared);
        }
    }
);

define_class!(
    #[unsafe(super(NSObject))]
    #[name = "PassByPeripheralManagerDelegate"]
    #[ivars = DelegateIvars]
    pub(super) struct PeripheralManagerDelegate;

    unsafe impl NSObjectProtocol for PeripheralManagerDelegate {}

    #[allow(non_snake_case)]
    unsafe impl CBPeripheralManagerDelegate for PeripheralManagerDelegate {
        #[unsafe(method(peripheralManagerDidUpdateState:))]
        fn peripheralManagerDidUpdateState(&self, peripheral: &CBPeripheralManager) {
            platform::advertise_if_ready(peripheral, &self.ivars().shared);
        }

        #[unsafe(method(peripheralManagerDidStartAdvertising:error:))]
        fn peripheralManagerDidStartAdvertising_error(&self, _peripheral: &CBPeripheralManager, error: Option<&NSError>) {
            let error = error.map(|err| err.localizedDescription().to_string());
            debug!("PeripheralManagerDelegate started advertising (error: {:?})", error);
            platform::advertising_started(error, &self.ivars().shared);
        }
    }
);

impl CentralDelegate {
    pub(super) fn new(shared: Arc<Shared>) -> Retained<Self> {
        let this = Self::alloc().set_ivars(DelegateIvars { shared });
        unsafe { msg_send![super(this), init] }
    }
}

impl PeripheralManagerDelegate {
    pub(super) fn new(shared: Arc<Shared>) -> Retained<Self> {
        let this = Self::alloc().set_ivars(DelegateIvars { shared });
        unsafe { msg_send![super(this), init] }
    }
}
