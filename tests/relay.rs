use std::sync::{Arc, Mutex};

use passby::*;

#[test]
fn dispatch_without_coordinator_is_noop() {
    let relay = EventRelay::new();
    assert!(relay.active_coordinator().is_none());

    relay.dispatch_device_discovered("device-1", None);
    relay.dispatch_advertising_outcome("", false, Some("Bluetooth not available"));
}

#[test]
fn dispatch_reaches_coordinator() {
    let relay = EventRelay::new();
    let coordinator = Coordinator::without_platform(&relay);
    let outcomes = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&outcomes);
    coordinator.set_advertising_outcome_callback(move |o| sink.lock().unwrap().push(o.clone()));

    relay.dispatch_device_discovered("device-1", Some("0a0b"));
    relay.dispatch_advertising_outcome("peripheral-1", true, None);

    assert_eq!(
        coordinator.discovered_device("device-1"),
        Some(DiscoveredDevice::new("device-1", Some("0a0b")))
    );
    assert_eq!(
        *outcomes.lock().unwrap(),
        vec![AdvertisingOutcome {
            peripheral_identifier: "peripheral-1".into(),
            success: true,
            error_message: None,
        }]
    );
}

#[test]
fn latest_coordinator_receives_events() {
    let relay = EventRelay::new();
    let first = Coordinator::without_platform(&relay);
    let second = Coordinator::without_platform(&relay);

    relay.dispatch_device_discovered("device-1", None);
    assert_eq!(first.discovered_device_count(), 0);
    assert_eq!(second.discovered_device_count(), 1);

    relay.register_active_coordinator(&first);
    relay.dispatch_device_discovered("device-2", None);
    assert_eq!(first.discovered_devices(), vec!["device-2"]);
    assert_eq!(second.discovered_devices(), vec!["device-1"]);
}

#[test]
fn relay_does_not_keep_coordinator_alive() {
    let relay = EventRelay::new();
    let coordinator = Coordinator::without_platform(&relay);
    assert!(relay.active_coordinator().is_some());

    drop(coordinator);
    assert!(relay.active_coordinator().is_none());
    relay.dispatch_device_discovered("device-1", None);
}

#[test]
fn clones_share_registration() {
    let relay = EventRelay::new();
    let clone = relay.clone();
    let coordinator = Coordinator::without_platform(&relay);

    clone.dispatch_device_discovered("device-1", None);
    assert_eq!(coordinator.discovered_devices(), vec!["device-1"]);
}

#[test]
fn active_coordinator_is_same_session() {
    let relay = EventRelay::new();
    let coordinator = Coordinator::without_platform(&relay);

    let active = relay.active_coordinator().unwrap();
    assert!(active.start_scanning("", ""));
    assert!(coordinator.is_scanning());
}
