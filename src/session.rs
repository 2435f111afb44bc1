use bytes::Bytes;
use std::time::Duration;
use tokio::{sync::mpsc, time::timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    ble::ControllerLink,
    error::{Result, RideError},
    protocol::handshake_payload,
    types::{ConnectionParams, ConnectionState},
    ACCEPTED_SERVICE_UUIDS, ASYNC_CHAR_UUID, SYNC_RX_CHAR_UUID,
};

/// One connection attempt to a controller
///
/// A session walks `Connecting -> DiscoveringService -> Handshaking ->
/// Subscribing -> Connected`. Any failure before `Connected` drops it back to
/// `Idle`; the owner discards the session and scans again. A failed
/// subscription is the one exception and still ends in `Connected`.
pub struct ConnectionSession<L> {
    link: L,
    state: ConnectionState,
    service_uuid: Option<Uuid>,
    write_char: Option<Uuid>,
    notify_char: Option<Uuid>,
    subscribed: bool,
    attempt: u32,
}

impl<L: ControllerLink> ConnectionSession<L> {
    /// Start a session for a discovered controller
    pub const fn new(link: L, attempt: u32) -> Self {
        Self {
            link,
            state: ConnectionState::Idle,
            service_uuid: None,
            write_char: None,
            notify_char: None,
            subscribed: false,
            attempt,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Service UUID negotiated during discovery
    #[must_use]
    pub const fn service_uuid(&self) -> Option<Uuid> {
        self.service_uuid
    }

    /// Write characteristic found during discovery
    #[must_use]
    pub const fn write_characteristic(&self) -> Option<Uuid> {
        self.write_char
    }

    /// Notify characteristic found during discovery
    #[must_use]
    pub const fn notify_characteristic(&self) -> Option<Uuid> {
        self.notify_char
    }

    /// Check if button notifications are flowing
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Connection attempt number this session belongs to
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Underlying transport link
    pub const fn link(&self) -> &L {
        &self.link
    }

    /// Run the whole connection sequence
    ///
    /// Returns the frame queue, or `None` when the session is connected in
    /// degraded mode without notifications.
    ///
    /// # Errors
    ///
    /// Returns the first failure of connect, discovery or handshake. The
    /// link has been disconnected and the session is back in `Idle` in that
    /// case.
    pub async fn establish(
        &mut self,
        params: &ConnectionParams,
    ) -> Result<Option<mpsc::Receiver<Bytes>>> {
        let result = self.run_steps(params).await;

        if let Err(e) = &result {
            warn!(
                "Connection attempt {} failed in {}: {}",
                self.attempt, self.state, e
            );
            self.abort().await;
        }

        result
    }

    async fn run_steps(
        &mut self,
        params: &ConnectionParams,
    ) -> Result<Option<mpsc::Receiver<Bytes>>> {
        self.connect(Duration::from_millis(params.connect_timeout_ms))
            .await?;
        self.discover_service().await?;
        self.handshake().await?;
        Ok(self.subscribe(params.notification_queue_capacity).await)
    }

    /// Open the transport link
    ///
    /// # Errors
    ///
    /// Returns [`RideError::TransportConnect`] if the link fails or does not
    /// come up within `connect_timeout`.
    pub async fn connect(&mut self, connect_timeout: Duration) -> Result<()> {
        self.state = ConnectionState::Connecting;
        info!(
            "Connecting to {} (attempt {})",
            self.link.info().name,
            self.attempt
        );

        match timeout(connect_timeout, self.link.connect()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e @ RideError::TransportConnect(_))) => Err(e),
            Ok(Err(e)) => Err(RideError::TransportConnect(e.to_string())),
            Err(_) => Err(RideError::TransportConnect(format!(
                "timed out after {}ms",
                connect_timeout.as_millis()
            ))),
        }
    }

    /// Probe the accepted service UUIDs in priority order
    ///
    /// # Errors
    ///
    /// Returns [`RideError::ServiceNotFound`] if no accepted service exists.
    pub async fn discover_service(&mut self) -> Result<Uuid> {
        self.state = ConnectionState::DiscoveringService;
        let services = self.link.discover_services().await?;

        for service in &services {
            debug!("Available service: {}", service.uuid);
        }

        let service = ACCEPTED_SERVICE_UUIDS
            .iter()
            .find_map(|accepted| services.iter().find(|s| s.uuid == *accepted))
            .ok_or(RideError::ServiceNotFound)?;

        info!("Found controller service: {}", service.uuid);
        self.service_uuid = Some(service.uuid);
        self.write_char = service
            .has_characteristic(SYNC_RX_CHAR_UUID)
            .then_some(SYNC_RX_CHAR_UUID);
        self.notify_char = service
            .has_characteristic(ASYNC_CHAR_UUID)
            .then_some(ASYNC_CHAR_UUID);

        Ok(service.uuid)
    }

    /// Write the handshake token to the write characteristic
    ///
    /// # Errors
    ///
    /// Returns [`RideError::CharacteristicNotFound`] if the service has no
    /// write characteristic, or the transport error of the write.
    pub async fn handshake(&mut self) -> Result<()> {
        self.state = ConnectionState::Handshaking;
        let write_char = self.write_char.ok_or(RideError::CharacteristicNotFound {
            uuid: SYNC_RX_CHAR_UUID,
        })?;

        info!("Sending handshake...");
        self.link
            .write_without_response(write_char, &handshake_payload())
            .await
    }

    /// Register for button notifications
    ///
    /// Never fails the session: on error the session is still `Connected`
    /// but no frames will arrive.
    pub async fn subscribe(&mut self, capacity: usize) -> Option<mpsc::Receiver<Bytes>> {
        self.state = ConnectionState::Subscribing;

        let result = match self.notify_char {
            Some(notify_char) => self.link.subscribe(notify_char, capacity).await,
            None => Err(RideError::CharacteristicNotFound {
                uuid: ASYNC_CHAR_UUID,
            }),
        };

        self.state = ConnectionState::Connected;
        match result {
            Ok(frames) => {
                info!("Subscribed to notifications");
                self.subscribed = true;
                Some(frames)
            }
            Err(e) => {
                let e = if e.is_degraded() {
                    e
                } else {
                    RideError::SubscriptionFailed(e.to_string())
                };
                warn!("{} - staying connected without button events", e);
                self.subscribed = false;
                None
            }
        }
    }

    /// Write a command to the controller once connected
    ///
    /// # Errors
    ///
    /// Returns [`RideError::NotConnected`] if the session is not `Connected`
    /// or has no write characteristic.
    pub async fn write_command(&self, payload: &[u8]) -> Result<()> {
        let write_char = match (self.state, self.write_char) {
            (ConnectionState::Connected, Some(write_char)) => write_char,
            _ => return Err(RideError::NotConnected),
        };

        self.link.write_without_response(write_char, payload).await
    }

    /// Check if the transport link is still up
    pub async fn is_link_connected(&self) -> bool {
        self.link.is_connected().await
    }

    /// Best-effort disconnect, leaving the session in `Idle`
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.link.disconnect().await {
            debug!("Disconnect failed: {}", e);
        }
        self.reset();
    }

    // A timed-out connect may still complete in the stack, so the transport
    // is always told to drop the link.
    async fn abort(&mut self) {
        self.disconnect().await;
    }

    fn reset(&mut self) {
        self.state = ConnectionState::Idle;
        self.service_uuid = None;
        self.write_char = None;
        self.notify_char = None;
        self.subscribed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ble::GattService,
        protocol::HANDSHAKE_TOKEN,
        testing::MockLink,
        LEGACY_SERVICE_UUID, RIDE_SERVICE_UUID,
    };
    use tokio_test::{assert_err, assert_ok};

    fn params() -> ConnectionParams {
        ConnectionParams {
            connect_timeout_ms: 1_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_establish_full_sequence() {
        let link = MockLink::ride();
        let mut session = ConnectionSession::new(link.clone(), 1);

        let frames = assert_ok!(session.establish(&params()).await);
        assert!(frames.is_some());
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(session.service_uuid(), Some(RIDE_SERVICE_UUID));
        assert_eq!(session.write_characteristic(), Some(SYNC_RX_CHAR_UUID));
        assert!(session.is_subscribed());

        let writes = link.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, SYNC_RX_CHAR_UUID);
        assert_eq!(writes[0].1, HANDSHAKE_TOKEN.to_vec());
    }

    #[tokio::test]
    async fn test_connect_failure_returns_to_idle() {
        let link = MockLink::ride().failing_connect();
        let mut session = ConnectionSession::new(link.clone(), 1);

        let error = assert_err!(session.establish(&params()).await);
        assert!(matches!(error, RideError::TransportConnect(_)));
        assert_eq!(session.state(), ConnectionState::Idle);
        assert!(link.writes().is_empty());
        assert_eq!(link.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_connect_timeout_disconnects_link() {
        let link = MockLink::ride().hanging_connect();
        let mut session = ConnectionSession::new(link.clone(), 1);
        let params = ConnectionParams {
            connect_timeout_ms: 10,
            ..Default::default()
        };

        let error = assert_err!(session.establish(&params).await);
        assert!(error.to_string().contains("timed out after 10ms"));
        assert_eq!(session.state(), ConnectionState::Idle);
        assert_eq!(link.disconnects(), 1);
        assert!(link.writes().is_empty());
    }

    #[tokio::test]
    async fn test_service_priority_order() {
        let services = vec![
            GattService {
                uuid: LEGACY_SERVICE_UUID,
                characteristics: vec![ASYNC_CHAR_UUID, SYNC_RX_CHAR_UUID],
            },
            GattService {
                uuid: RIDE_SERVICE_UUID,
                characteristics: vec![ASYNC_CHAR_UUID, SYNC_RX_CHAR_UUID],
            },
        ];
        let mut session = ConnectionSession::new(MockLink::with_services(services), 1);

        assert_eq!(session.discover_service().await.unwrap(), RIDE_SERVICE_UUID);
    }

    #[tokio::test]
    async fn test_legacy_service_accepted() {
        let services = vec![GattService {
            uuid: LEGACY_SERVICE_UUID,
            characteristics: vec![ASYNC_CHAR_UUID, SYNC_RX_CHAR_UUID],
        }];
        let mut session = ConnectionSession::new(MockLink::with_services(services), 1);

        assert_ok!(session.establish(&params()).await);
        assert_eq!(session.service_uuid(), Some(LEGACY_SERVICE_UUID));
    }

    #[tokio::test]
    async fn test_service_not_found() {
        let services = vec![GattService {
            uuid: Uuid::from_u128(0x0000_180F_0000_1000_8000_0080_5F9B_34FB),
            characteristics: vec![],
        }];
        let link = MockLink::with_services(services);
        let mut session = ConnectionSession::new(link.clone(), 1);

        let error = assert_err!(session.establish(&params()).await);
        assert!(matches!(error, RideError::ServiceNotFound));
        assert_eq!(session.state(), ConnectionState::Idle);
        assert_eq!(link.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_missing_write_characteristic() {
        let services = vec![GattService {
            uuid: RIDE_SERVICE_UUID,
            characteristics: vec![ASYNC_CHAR_UUID],
        }];
        let mut session = ConnectionSession::new(MockLink::with_services(services), 1);

        let error = assert_err!(session.establish(&params()).await);
        assert!(matches!(
            error,
            RideError::CharacteristicNotFound { uuid } if uuid == SYNC_RX_CHAR_UUID
        ));
        assert_eq!(session.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_subscription_failure_is_degraded() {
        let link = MockLink::ride().failing_subscribe();
        let mut session = ConnectionSession::new(link.clone(), 1);

        let frames = assert_ok!(session.establish(&params()).await);
        assert!(frames.is_none());
        assert_eq!(session.state(), ConnectionState::Connected);
        assert!(!session.is_subscribed());
        assert_eq!(link.disconnects(), 0);
    }

    #[tokio::test]
    async fn test_missing_notify_characteristic_is_degraded() {
        let services = vec![GattService {
            uuid: RIDE_SERVICE_UUID,
            characteristics: vec![SYNC_RX_CHAR_UUID],
        }];
        let mut session = ConnectionSession::new(MockLink::with_services(services), 1);

        let frames = assert_ok!(session.establish(&params()).await);
        assert!(frames.is_none());
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_write_command_requires_connected() {
        let link = MockLink::ride();
        let mut session = ConnectionSession::new(link.clone(), 1);

        let error = assert_err!(session.write_command(&[0x01]).await);
        assert!(matches!(error, RideError::NotConnected));

        assert_ok!(session.establish(&params()).await);
        assert_ok!(session.write_command(&[0x01]).await);
        assert_eq!(link.writes().len(), 2);

        session.disconnect().await;
        assert_eq!(session.state(), ConnectionState::Idle);
        assert!(session.write_command(&[0x01]).await.is_err());
    }
}
