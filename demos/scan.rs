use std::error::Error;
use std::time::Duration;

use passby::{create_platform_with_config, Coordinator, EventRelay, PlatformConfig};
use tracing::{info, metadata::LevelFilter, warn};

fn main() -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // scan [seconds] [service-uuid] [local-name]
    let mut args = std::env::args().skip(1);
    let seconds: u64 = args.next().map(|x| x.parse()).transpose()?.unwrap_or(10);
    let service_filter = args.next().unwrap_or_default();
    let local_identifier = args.next().unwrap_or_default();

    let relay = EventRelay::new();
    let platform = create_platform_with_config(&relay, PlatformConfig::default());
    let coordinator = Coordinator::new(&relay, platform);

    coordinator.set_device_discovered_callback(|device| {
        info!("{} {:?}", device.identifier, device.correlation_hash);
    });
    coordinator.set_advertising_outcome_callback(|outcome| {
        if outcome.success {
            info!("advertising as {:?}", outcome.peripheral_identifier);
        } else {
            warn!("advertising failed: {:?}", outcome.error_message);
        }
    });

    info!("passby {} starting scan", passby::version());
    if !coordinator.start_scanning(&service_filter, &local_identifier) {
        return Err("failed to start scanning".into());
    }
    info!("scan started");

    std::thread::sleep(Duration::from_secs(seconds));
    coordinator.stop_scanning();

    info!("{} peers nearby", coordinator.discovered_device_count());
    for identifier in coordinator.discovered_devices() {
        info!("  {}", identifier);
    }

    Ok(())
}
