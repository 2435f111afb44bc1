use ridekeys::{ble::BleScanner, keyboard::KeyboardOutput, Bridge, BridgeConfig, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚴 Ridekeys v{}", ridekeys::VERSION);

    let config = match std::env::args().nth(1) {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };

    let scanner = match BleScanner::new().await {
        Ok(scanner) => scanner,
        Err(e) => {
            error!("❌ Failed to initialize Bluetooth: {}", e);
            return Err(e);
        }
    };

    #[cfg(feature = "desktop")]
    let keyboard = ridekeys::keyboard::EnigoKeyboard::new()?;
    #[cfg(not(feature = "desktop"))]
    let keyboard = ridekeys::keyboard::LogKeyboard;

    run(Bridge::new(scanner, keyboard, config)).await;
    Ok(())
}

async fn run<K: KeyboardOutput>(mut bridge: Bridge<BleScanner, K>) {
    info!("Press Ctrl+C to stop");

    tokio::select! {
        () = bridge.run() => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    info!("👋 Shutting down: {}", bridge.stats());
}
