use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::info;

use crate::{
    error::{Result, RideError},
    types::{ConnectionParams, HapticTiming},
};

/// Runtime configuration of the bridge
///
/// Every field has a default, so a config file only needs the values it
/// changes:
///
/// ```json
/// { "enable_haptic_feedback": true }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Vibrate on every mapped button release
    ///
    /// The post-connect confirmation vibrates regardless of this flag.
    pub enable_haptic_feedback: bool,
    /// Scan, connect and retry timing
    pub connection: ConnectionParams,
    /// Post-connect confirmation timing
    pub haptics: HapticTiming,
}

impl BridgeConfig {
    /// Parse a configuration from JSON
    ///
    /// # Errors
    ///
    /// Returns [`RideError::Json`] for malformed input and
    /// [`RideError::Config`] for values the bridge cannot run with.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns [`RideError::Io`] if the file cannot be read, or any error of
    /// [`BridgeConfig::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check that the values are usable
    ///
    /// # Errors
    ///
    /// Returns [`RideError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let connection = &self.connection;

        if connection.initial_scan_timeout_ms == 0 || connection.retry_scan_timeout_ms == 0 {
            return Err(RideError::Config(
                "scan timeouts must be greater than zero".to_string(),
            ));
        }

        if connection.connect_timeout_ms == 0 {
            return Err(RideError::Config(
                "connect timeout must be greater than zero".to_string(),
            ));
        }

        if connection.notification_queue_capacity == 0 {
            return Err(RideError::Config(
                "notification queue capacity must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
