#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

//! # Ridekeys 🚴
//!
//! Turns the handlebar buttons of a RideOn controller pair into keyboard and
//! media-key presses over Bluetooth Low Energy.
//!
//! The controller exposes one vendor GATT service. After the host writes the
//! `RideOn` handshake to the sync RX characteristic, the controller streams
//! button state on the async characteristic. Each frame carries three button
//! slots (byte offsets 2, 3 and 4); a slot reads `0xFF` when nothing is held
//! and a button code otherwise. A key fires when a slot goes from a button
//! code back to `0xFF`, i.e. on release.
//!
//! ## Protocol Summary
//!
//! - **Service**: `FC82` (current firmware), or the legacy
//!   `00000001-19CA-4651-86E5-FA29DCDD09D1` service
//! - **Characteristics**: `0002` notifications, `0003` writes without
//!   response, `0004` and `0006` unused
//! - **Haptics**: an 11-byte vibration command written to `0003`
//!
//! ## Quick Start
//!
//! ```no_run
//! use ridekeys::{ble::BleScanner, keyboard::LogKeyboard, Bridge, BridgeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scanner = BleScanner::new().await?;
//!     let mut bridge = Bridge::new(scanner, LogKeyboard, BridgeConfig::default());
//!
//!     // Scans, connects and reconnects forever
//!     bridge.run().await;
//!     Ok(())
//! }
//! ```

/// Bluetooth Low Energy transport
pub mod ble;
/// Main processing loop
pub mod bridge;
/// Runtime configuration
pub mod config;
/// Release-event to keyboard dispatch
pub mod dispatch;
/// Error types and handling
pub mod error;
/// Vibration commands and connection confirmation
pub mod haptics;
/// Keyboard output seam and implementations
pub mod keyboard;
/// Default button mapping table
pub mod mapping;
/// Frame decoding and command payloads
pub mod protocol;
/// Connection lifecycle of a single controller
pub mod session;
/// Type definitions and data structures
pub mod types;

#[cfg(test)]
mod testing;

// Re-export the main types for convenient usage
pub use bridge::{Bridge, BridgeStats};
pub use config::BridgeConfig;
pub use error::{Result, RideError};
pub use types::{
    Action, ButtonMapping, ConnectionParams, ConnectionState, ControllerInfo, HapticTiming,
    MediaKey, Slot,
};

use uuid::Uuid;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// RideOn service UUID used by current controller firmware
///
/// 16-bit `FC82` expanded onto the Bluetooth base UUID.
pub const RIDE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_FC82_0000_1000_8000_0080_5F9B_34FB);

/// Service UUID advertised by older controller firmware
pub const LEGACY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_0001_19CA_4651_86E5_FA29_DCDD_09D1);

/// Service UUIDs a controller may expose, in the order they are tried
pub const ACCEPTED_SERVICE_UUIDS: [Uuid; 2] = [RIDE_SERVICE_UUID, LEGACY_SERVICE_UUID];

/// Async characteristic: button state notifications
pub const ASYNC_CHAR_UUID: Uuid = Uuid::from_u128(0x0000_0002_19CA_4651_86E5_FA29_DCDD_09D1);

/// Sync RX characteristic: handshake and vibration writes
pub const SYNC_RX_CHAR_UUID: Uuid = Uuid::from_u128(0x0000_0003_19CA_4651_86E5_FA29_DCDD_09D1);

/// Sync TX characteristic, present but unused
pub const SYNC_TX_CHAR_UUID: Uuid = Uuid::from_u128(0x0000_0004_19CA_4651_86E5_FA29_DCDD_09D1);

/// Undocumented characteristic, present but unused
pub const UNKNOWN_CHAR_UUID: Uuid = Uuid::from_u128(0x0000_0006_19CA_4651_86E5_FA29_DCDD_09D1);
