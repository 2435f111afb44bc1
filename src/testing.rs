//! In-memory transport and keyboard doubles used by unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    ble::{ControllerLink, GattService, Scanner},
    error::{Result, RideError},
    keyboard::KeyboardOutput,
    protocol::build_vibration_command,
    types::{Action, ControllerInfo, MediaKey},
    ASYNC_CHAR_UUID, RIDE_SERVICE_UUID, SYNC_RX_CHAR_UUID, SYNC_TX_CHAR_UUID, UNKNOWN_CHAR_UUID,
};

#[derive(Default)]
struct LinkLog {
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    disconnects: AtomicUsize,
    liveness_polls: AtomicUsize,
    connected: AtomicBool,
}

/// Scripted controller link
#[derive(Clone)]
pub struct MockLink {
    info: ControllerInfo,
    services: Vec<GattService>,
    frames: Vec<Vec<u8>>,
    fail_connect: bool,
    hang_connect: bool,
    fail_subscribe: bool,
    alive_polls: usize,
    log: Arc<LinkLog>,
}

impl MockLink {
    /// Controller exposing the full current-firmware service
    pub fn ride() -> Self {
        Self::with_services(vec![GattService {
            uuid: RIDE_SERVICE_UUID,
            characteristics: vec![
                ASYNC_CHAR_UUID,
                SYNC_RX_CHAR_UUID,
                SYNC_TX_CHAR_UUID,
                UNKNOWN_CHAR_UUID,
            ],
        }])
    }

    /// Controller exposing the given services
    pub fn with_services(services: Vec<GattService>) -> Self {
        Self {
            info: ControllerInfo::new("Mock Ride".to_string(), "00:11:22:33:44:55".to_string()),
            services,
            frames: Vec::new(),
            fail_connect: false,
            hang_connect: false,
            fail_subscribe: false,
            alive_polls: usize::MAX,
            log: Arc::new(LinkLog::default()),
        }
    }

    /// Fail every connect attempt
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Never complete a connect attempt
    pub fn hanging_connect(mut self) -> Self {
        self.hang_connect = true;
        self
    }

    /// Fail notification registration
    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// Frames delivered right after subscribing; the stream then ends
    pub fn with_frames(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.frames = frames;
        self
    }

    /// Report the link as down after this many liveness checks
    pub fn alive_for(mut self, polls: usize) -> Self {
        self.alive_polls = polls;
        self
    }

    /// Every write so far
    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.log
            .writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    /// Number of vibration commands written
    pub fn vibrations(&self) -> usize {
        let command = build_vibration_command();
        self.writes()
            .iter()
            .filter(|(_, data)| data[..] == command[..])
            .count()
    }

    /// Number of disconnect calls
    pub fn disconnects(&self) -> usize {
        self.log.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControllerLink for MockLink {
    fn info(&self) -> &ControllerInfo {
        &self.info
    }

    async fn connect(&self) -> Result<()> {
        if self.fail_connect {
            return Err(RideError::TransportConnect("link refused".to_string()));
        }
        if self.hang_connect {
            std::future::pending::<()>().await;
        }
        self.log.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn discover_services(&self) -> Result<Vec<GattService>> {
        Ok(self.services.clone())
    }

    async fn write_without_response(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        if let Ok(mut writes) = self.log.writes.lock() {
            writes.push((characteristic, data.to_vec()));
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        _characteristic: Uuid,
        capacity: usize,
    ) -> Result<mpsc::Receiver<Bytes>> {
        if self.fail_subscribe {
            return Err(RideError::SubscriptionFailed("notify not permitted".to_string()));
        }

        let (sender, receiver) = mpsc::channel(capacity.max(self.frames.len()).max(1));
        for frame in &self.frames {
            let _ = sender.try_send(Bytes::from(frame.clone()));
        }
        Ok(receiver)
    }

    async fn is_connected(&self) -> bool {
        let polls = self.log.liveness_polls.fetch_add(1, Ordering::SeqCst);
        self.log.connected.load(Ordering::SeqCst) && polls < self.alive_polls
    }

    async fn disconnect(&self) -> Result<()> {
        self.log.disconnects.fetch_add(1, Ordering::SeqCst);
        self.log.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Scanner handing out clones of one scripted link
pub struct MockScanner {
    link: MockLink,
    misses: AtomicUsize,
    timeouts: Mutex<Vec<Duration>>,
}

impl MockScanner {
    /// Scanner that always finds `link`
    pub fn new(link: MockLink) -> Self {
        Self {
            link,
            misses: AtomicUsize::new(0),
            timeouts: Mutex::new(Vec::new()),
        }
    }

    /// Time out this many scans before finding the link
    pub fn missing_first(self, misses: usize) -> Self {
        self.misses.store(misses, Ordering::SeqCst);
        self
    }

    /// Scan timeouts requested so far
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts
            .lock()
            .map(|timeouts| timeouts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Scanner for MockScanner {
    type Link = MockLink;

    async fn scan(&self, scan_timeout: Duration) -> Result<MockLink> {
        if let Ok(mut timeouts) = self.timeouts.lock() {
            timeouts.push(scan_timeout);
        }

        let missed = self
            .misses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |m| m.checked_sub(1))
            .is_ok();
        if missed {
            return Err(RideError::ScanTimeout {
                timeout_ms: u64::try_from(scan_timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }

        Ok(self.link.clone())
    }
}

/// Keyboard remembering every action it was asked to emit
#[derive(Clone, Default)]
pub struct RecordingKeyboard {
    actions: Arc<Mutex<Vec<Action>>>,
    fail: bool,
}

impl RecordingKeyboard {
    /// Keyboard rejecting every event
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Actions emitted so far
    pub fn actions(&self) -> Vec<Action> {
        self.actions
            .lock()
            .map(|actions| actions.clone())
            .unwrap_or_default()
    }

    fn record(&self, action: Action) -> Result<()> {
        if self.fail {
            return Err(RideError::Keyboard("host not connected".to_string()));
        }
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
        Ok(())
    }
}

#[async_trait]
impl KeyboardOutput for RecordingKeyboard {
    async fn press_key(&self, key: char) -> Result<()> {
        self.record(Action::KeyPress(key))
    }

    async fn press_media(&self, key: MediaKey) -> Result<()> {
        self.record(Action::MediaKey(key))
    }
}
