use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while bridging a controller to keyboard output
#[derive(Error, Debug)]
pub enum RideError {
    /// Bluetooth Low Energy related errors
    #[error("BLE error: {0}")]
    Ble(#[from] btleplug::Error),

    /// No Bluetooth adapter available on this host
    #[error("No Bluetooth adapter found")]
    AdapterNotFound,

    /// No controller advertised an accepted service before the scan ended
    #[error("No controller found after scanning for {timeout_ms}ms")]
    ScanTimeout {
        /// Scan duration in milliseconds
        timeout_ms: u64,
    },

    /// The transport link could not be established
    #[error("Failed to connect to controller: {0}")]
    TransportConnect(String),

    /// None of the accepted service UUIDs is exposed by the peripheral
    #[error("Controller service not found")]
    ServiceNotFound,

    /// A required characteristic is missing from the negotiated service
    #[error("Characteristic {uuid} not found")]
    CharacteristicNotFound {
        /// UUID of the missing characteristic
        uuid: Uuid,
    },

    /// Notification registration failed; the session stays connected
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    /// The write channel is not available
    #[error("Controller not connected")]
    NotConnected,

    /// The keyboard collaborator rejected an event
    #[error("Keyboard output error: {0}")]
    Keyboard(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, RideError>;

impl RideError {
    /// Check if this error ends a connection attempt and triggers a rescan
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Ble(_)
                | Self::AdapterNotFound
                | Self::ScanTimeout { .. }
                | Self::TransportConnect(_)
                | Self::ServiceNotFound
                | Self::CharacteristicNotFound { .. }
                | Self::NotConnected
        )
    }

    /// Check if this error leaves the session connected but inert
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::SubscriptionFailed(_))
    }
}
