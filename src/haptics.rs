use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    ble::ControllerLink,
    error::RideError,
    protocol::build_vibration_command,
    session::ConnectionSession,
    types::HapticTiming,
};

/// Sends vibration commands to a connected controller
///
/// Two callers use this: the per-button acknowledgement, which the bridge
/// gates on its configuration, and the connection confirmation, which always
/// runs.
#[derive(Debug, Clone)]
pub struct HapticEncoder {
    command: Bytes,
    timing: HapticTiming,
}

impl HapticEncoder {
    /// Create an encoder with the given confirmation timing
    #[must_use]
    pub fn new(timing: HapticTiming) -> Self {
        Self {
            command: build_vibration_command(),
            timing,
        }
    }

    /// The vibration payload written on every pulse
    #[must_use]
    pub fn build_command(&self) -> Bytes {
        self.command.clone()
    }

    /// Write one vibration pulse
    ///
    /// Does nothing but warn when the session has no usable write channel.
    /// Returns `true` if the command was written.
    pub async fn send<L: ControllerLink>(&self, session: &ConnectionSession<L>) -> bool {
        match session.write_command(&self.command).await {
            Ok(()) => {
                debug!("Vibration command sent");
                true
            }
            Err(RideError::NotConnected) => {
                warn!("Write characteristic not available, skipping vibration");
                false
            }
            Err(e) => {
                warn!("Failed to send vibration command: {}", e);
                false
            }
        }
    }

    /// Signal a fresh connection: one pulse, a pause, then two pulses
    ///
    /// Returns the number of pulses written.
    pub async fn confirm_connection<L: ControllerLink>(
        &self,
        session: &ConnectionSession<L>,
    ) -> usize {
        info!("Sending connection confirmation");

        tokio::time::sleep(Duration::from_millis(self.timing.settle_ms)).await;
        let mut sent = usize::from(self.send(session).await);

        tokio::time::sleep(Duration::from_millis(self.timing.pause_ms)).await;
        sent += usize::from(self.send(session).await);

        tokio::time::sleep(Duration::from_millis(self.timing.gap_ms)).await;
        sent += usize::from(self.send(session).await);

        sent
    }
}

impl Default for HapticEncoder {
    fn default() -> Self {
        Self::new(HapticTiming::default())
    }
}
