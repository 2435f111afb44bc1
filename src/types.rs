use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// Sentinel byte reported in a slot while no button is held
pub const NO_BUTTON: u8 = 0xFF;

/// Frame byte slot carrying a button code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// Frame offset 2: left pad directions and right A/B/Y
    Two,
    /// Frame offset 3: left power, side buttons and right Z
    Three,
    /// Frame offset 4: right power and right lower side button
    Four,
}

impl Slot {
    /// All slots in frame order
    pub const ALL: [Self; 3] = [Self::Two, Self::Three, Self::Four];

    /// Byte offset of this slot inside a notification frame
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }

    /// Index of this slot into per-slot state arrays
    #[must_use]
    pub const fn index(self) -> usize {
        self.offset() - 2
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot{}", self.offset())
    }
}

/// Consumer-control media keys the bridge can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKey {
    /// Volume increment
    VolumeUp,
    /// Volume decrement
    VolumeDown,
    /// Scan previous track
    PreviousTrack,
    /// Scan next track
    NextTrack,
    /// Play/pause toggle
    PlayPause,
}

impl MediaKey {
    /// USB HID consumer page (0x0C) usage id for this key
    #[must_use]
    pub const fn usage_id(self) -> u16 {
        match self {
            Self::VolumeUp => 0x00E9,
            Self::VolumeDown => 0x00EA,
            Self::PreviousTrack => 0x00B6,
            Self::NextTrack => 0x00B5,
            Self::PlayPause => 0x00CD,
        }
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VolumeUp => write!(f, "Volume Up"),
            Self::VolumeDown => write!(f, "Volume Down"),
            Self::PreviousTrack => write!(f, "Previous Track"),
            Self::NextTrack => write!(f, "Next Track"),
            Self::PlayPause => write!(f, "Play/Pause"),
        }
    }
}

/// Output produced for a released button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// A single literal character typed on the keyboard
    KeyPress(char),
    /// A consumer-control media key
    MediaKey(MediaKey),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyPress(' ') => write!(f, "key 'space'"),
            Self::KeyPress(c) => write!(f, "key '{c}'"),
            Self::MediaKey(key) => write!(f, "media {key}"),
        }
    }
}

/// Binding of one physical button to an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonMapping {
    /// Frame slot the button reports in
    pub slot: Slot,
    /// Code reported while the button is held
    pub code: u8,
    /// Output emitted on release
    pub action: Action,
    /// Human readable button name
    pub description: &'static str,
}

impl ButtonMapping {
    /// Create a mapping entry
    #[must_use]
    pub const fn new(slot: Slot, code: u8, action: Action, description: &'static str) -> Self {
        Self {
            slot,
            code,
            action,
            description,
        }
    }
}

/// Connection lifecycle of a controller session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Nothing in progress, waiting to rescan
    Idle,
    /// Looking for an advertising controller
    Scanning,
    /// Opening the transport link
    Connecting,
    /// Probing accepted service UUIDs
    DiscoveringService,
    /// Writing the handshake token
    Handshaking,
    /// Registering for state notifications
    Subscribing,
    /// Session established (possibly without notifications)
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Connecting => write!(f, "Connecting"),
            Self::DiscoveringService => write!(f, "Discovering Service"),
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Subscribing => write!(f, "Subscribing"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Information about a discovered controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInfo {
    /// Advertised local name
    pub name: String,
    /// Bluetooth address as reported by the stack
    pub address: String,
    /// Signal strength (RSSI)
    pub rssi: Option<i16>,
}

impl ControllerInfo {
    /// Create new controller info
    #[must_use]
    pub const fn new(name: String, address: String) -> Self {
        Self {
            name,
            address,
            rssi: None,
        }
    }
}

/// Connection and scheduling parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    /// Scan duration for the first scan after startup
    pub initial_scan_timeout_ms: u64,
    /// Scan duration for every scan after a failure
    pub retry_scan_timeout_ms: u64,
    /// Transport connect timeout
    pub connect_timeout_ms: u64,
    /// Fixed delay between a failure and the next scan
    pub retry_delay_ms: u64,
    /// Main loop idle interval
    pub idle_interval_ms: u64,
    /// Capacity of the notification frame queue
    pub notification_queue_capacity: usize,
}

impl ConnectionParams {
    /// Scan timeout for the given scan number (0 = first scan)
    #[must_use]
    pub const fn scan_timeout(&self, scan_number: u32) -> Duration {
        if scan_number == 0 {
            Duration::from_millis(self.initial_scan_timeout_ms)
        } else {
            Duration::from_millis(self.retry_scan_timeout_ms)
        }
    }

    /// Idle interval, never zero
    #[must_use]
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms.max(1))
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            initial_scan_timeout_ms: 30_000,
            retry_scan_timeout_ms: 15_000,
            connect_timeout_ms: 10_000,
            retry_delay_ms: 1_000,
            idle_interval_ms: 100,
            notification_queue_capacity: 64,
        }
    }
}

/// Timing of the post-connect haptic confirmation sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticTiming {
    /// Wait after connecting before the first pulse
    pub settle_ms: u64,
    /// Pause between the first pulse and the double pulse
    pub pause_ms: u64,
    /// Gap between the two pulses of the double pulse
    pub gap_ms: u64,
}

impl HapticTiming {
    /// Timing with every delay set to zero
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            settle_ms: 0,
            pause_ms: 0,
            gap_ms: 0,
        }
    }
}

impl Default for HapticTiming {
    fn default() -> Self {
        Self {
            settle_ms: 500,
            pause_ms: 2_000,
            gap_ms: 500,
        }
    }
}
