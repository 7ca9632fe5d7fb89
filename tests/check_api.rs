use passby::error::ErrorKind;
use passby::mock::MockPlatform;
use passby::*;

fn assert_send<T: Send>(t: T) -> T {
    t
}

fn assert_sync<T: Sync>(t: T) -> T {
    t
}

fn check_coordinator_apis(coordinator: Coordinator) -> Coordinator {
    let coordinator = assert_sync(assert_send(coordinator));

    let _version: &str = Coordinator::version();
    let _started: bool = coordinator.start_scanning("", "");
    let _scanning: bool = coordinator.is_scanning();
    let _filter: String = coordinator.current_service_filter();
    let _state: SessionState = coordinator.state();
    let _active: bool = coordinator.is_platform_active();

    coordinator.set_device_discovered_callback(|_: &DiscoveredDevice| {});
    coordinator.set_advertising_outcome_callback(|_: &AdvertisingOutcome| {});
    coordinator.on_device_discovered("peer", None);
    coordinator.on_advertising_outcome("", true, None);

    let _devices: Vec<String> = coordinator.discovered_devices();
    let _device: Option<DiscoveredDevice> = coordinator.discovered_device("peer");
    let _count: usize = coordinator.discovered_device_count();
    coordinator.clear_discovered_devices();

    let _stopped: bool = coordinator.stop_scanning();
    coordinator
}

fn check_relay_apis(relay: EventRelay) -> EventRelay {
    let relay = assert_sync(assert_send(relay));

    let _coordinator: Option<Coordinator> = relay.active_coordinator();
    relay.dispatch_device_discovered("peer", Some("00"));
    relay.dispatch_advertising_outcome("", false, Some("error"));
    relay
}

fn check_platform_apis(mut platform: Box<dyn BlePlatform>) -> Box<dyn BlePlatform> {
    let _res: Result<()> = platform.start_ble("", "");
    let _active: bool = platform.is_active();
    let _res: Result<()> = platform.stop_ble();
    assert_send(platform)
}

fn check_error_apis(err: Error) {
    let err = assert_sync(assert_send(err));
    let _kind: ErrorKind = err.kind();
    let _message: &str = err.message();
    let _source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(&err);
}

#[test]
fn check_apis() {
    let relay = check_relay_apis(EventRelay::new());
    let platform = check_platform_apis(Box::new(MockPlatform::new()));
    let coordinator = check_coordinator_apis(Coordinator::new(&relay, platform));
    relay.register_active_coordinator(&coordinator);

    let _config: PlatformConfig = PlatformConfig::default();
    let _mock: MockPlatform = assert_sync(assert_send(MockPlatform::new()));
    check_error_apis(ErrorKind::NotSupported.into());

    assert_eq!(version(), VERSION);
}
