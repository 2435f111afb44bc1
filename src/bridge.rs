use bytes::Bytes;
use std::{fmt, time::Duration};
use tokio::{
    sync::mpsc,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    ble::{ControllerLink, Scanner},
    config::BridgeConfig,
    dispatch::Dispatcher,
    error::RideError,
    haptics::HapticEncoder,
    keyboard::KeyboardOutput,
    mapping::ActionTable,
    protocol::FrameDecoder,
    session::ConnectionSession,
    types::ConnectionState,
};

/// Counters collected while the bridge runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Scans that ended without a controller
    pub scan_timeouts: u32,
    /// Sessions started after a controller was found
    pub connection_attempts: u32,
    /// Sessions that reached `Connected`
    pub sessions: u32,
    /// Notification frames received
    pub frames: u64,
    /// Release edges decoded
    pub releases: u64,
    /// Releases that produced keyboard output
    pub dispatched: u64,
    /// Releases with no mapping
    pub unmapped: u64,
    /// Vibration commands written
    pub haptic_pulses: u64,
}

impl fmt::Display for BridgeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sessions {}/{} attempts, {} frames, {} releases ({} dispatched, {} unmapped), {} haptic pulses",
            self.sessions,
            self.connection_attempts,
            self.frames,
            self.releases,
            self.dispatched,
            self.unmapped,
            self.haptic_pulses
        )
    }
}

/// Main processing loop: scan, connect, decode and dispatch, forever
///
/// Owns the decoder and the haptic request flag. Frames reach it through the
/// session's bounded queue, so nothing here is shared with the notification
/// task.
pub struct Bridge<S: Scanner, K> {
    scanner: S,
    dispatcher: Dispatcher<K>,
    decoder: FrameDecoder,
    haptics: HapticEncoder,
    config: BridgeConfig,
    state: ConnectionState,
    session: Option<ConnectionSession<S::Link>>,
    frames: Option<mpsc::Receiver<Bytes>>,
    scans: u32,
    stats: BridgeStats,
}

impl<S: Scanner, K: KeyboardOutput> Bridge<S, K> {
    /// Create a bridge with the default button mappings
    pub fn new(scanner: S, keyboard: K, config: BridgeConfig) -> Self {
        Self::with_table(scanner, keyboard, config, ActionTable::default())
    }

    /// Create a bridge with a custom mapping table
    pub fn with_table(scanner: S, keyboard: K, config: BridgeConfig, table: ActionTable) -> Self {
        if table.is_empty() {
            warn!("Mapping table is empty, buttons will produce no output");
        } else {
            debug!("Loaded {} button mappings", table.len());
            for mapping in table.mappings() {
                debug!(
                    "  {} 0x{:02X} -> {} ({})",
                    mapping.slot, mapping.code, mapping.action, mapping.description
                );
            }
        }

        let haptics = HapticEncoder::new(config.haptics.clone());
        Self {
            scanner,
            dispatcher: Dispatcher::new(table, keyboard),
            decoder: FrameDecoder::new(),
            haptics,
            config,
            state: ConnectionState::Idle,
            session: None,
            frames: None,
            scans: 0,
            stats: BridgeStats::default(),
        }
    }

    /// Current connection state
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Counters collected so far
    pub const fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Established session, if any
    pub const fn session(&self) -> Option<&ConnectionSession<S::Link>> {
        self.session.as_ref()
    }

    /// Keep a controller connected and bridged while the process lives
    pub async fn run(&mut self) {
        info!(
            "Bridge started (haptic feedback {})",
            if self.config.enable_haptic_feedback {
                "on"
            } else {
                "off"
            }
        );

        loop {
            if self.connect_cycle().await == ConnectionState::Connected {
                self.serve().await;
            }
        }
    }

    /// Scan once and try to establish a session
    ///
    /// Returns `Connected` on success. On any failure the bridge passes
    /// through `Idle`, waits the fixed retry delay and returns `Scanning`.
    pub async fn connect_cycle(&mut self) -> ConnectionState {
        self.state = ConnectionState::Scanning;
        let scan_timeout = self.config.connection.scan_timeout(self.scans);
        self.scans = self.scans.saturating_add(1);

        let link = match self.scanner.scan(scan_timeout).await {
            Ok(link) => link,
            Err(e) => {
                if matches!(e, RideError::ScanTimeout { .. }) {
                    self.stats.scan_timeouts += 1;
                }
                self.recover(&e).await;
                return self.state;
            }
        };

        self.stats.connection_attempts += 1;
        let mut session = ConnectionSession::new(link, self.stats.connection_attempts);
        self.state = ConnectionState::Connecting;

        match session.establish(&self.config.connection).await {
            Ok(frames) => {
                self.state = session.state();
                self.stats.sessions += 1;
                info!(
                    "Connected to {} via service {}{}",
                    session.link().info().name,
                    session
                        .service_uuid()
                        .map_or_else(|| "?".to_string(), |uuid| uuid.to_string()),
                    if frames.is_some() {
                        ""
                    } else {
                        " (no button events)"
                    }
                );

                self.decoder.reset();
                self.dispatcher.take_haptic_request();

                let pulses = self.haptics.confirm_connection(&session).await;
                self.stats.haptic_pulses += u64::try_from(pulses).unwrap_or(u64::MAX);

                self.session = Some(session);
                self.frames = frames;
                self.state
            }
            Err(e) => {
                self.recover(&e).await;
                self.state
            }
        }
    }

    /// Process frames until the controller goes away
    ///
    /// Does nothing without an established session.
    pub async fn serve(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let mut frames = self.frames.take();

        let mut idle = interval(self.config.connection.idle_interval());
        idle.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = next_frame(&mut frames) => match frame {
                    Some(frame) => self.process_frame(&frame).await,
                    None => {
                        info!("Notification stream ended");
                        break;
                    }
                },
                _ = idle.tick() => {
                    if !session.is_link_connected().await {
                        warn!("Controller disconnected");
                        break;
                    }
                }
            }

            if self.dispatcher.take_haptic_request()
                && self.config.enable_haptic_feedback
                && self.haptics.send(&session).await
            {
                self.stats.haptic_pulses += 1;
            }
        }

        session.disconnect().await;
        self.state = ConnectionState::Idle;
        info!("Session ended: {}", self.stats);
    }

    /// Decode one frame and dispatch its releases
    pub async fn process_frame(&mut self, frame: &[u8]) {
        self.stats.frames += 1;

        for event in self.decoder.decode(frame) {
            self.stats.releases += 1;

            match self.dispatcher.handle_release(event).await {
                Ok(Some(_)) => self.stats.dispatched += 1,
                Ok(None) => self.stats.unmapped += 1,
                Err(e) => warn!("Failed to emit {} code 0x{:02X}: {}", event.slot, event.code, e),
            }
        }
    }

    async fn recover(&mut self, error: &RideError) {
        self.state = ConnectionState::Idle;
        let delay = Duration::from_millis(self.config.connection.retry_delay_ms);

        if matches!(error, RideError::ScanTimeout { .. }) {
            debug!("{}, scanning again", error);
        } else if error.is_connection_error() {
            warn!("{}, restarting scan in {}ms", error, delay.as_millis());
        } else {
            error!(
                "Unexpected failure: {}, restarting scan in {}ms",
                error,
                delay.as_millis()
            );
        }

        tokio::time::sleep(delay).await;
        self.state = ConnectionState::Scanning;
    }
}

async fn next_frame(frames: &mut Option<mpsc::Receiver<Bytes>>) -> Option<Bytes> {
    match frames {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
