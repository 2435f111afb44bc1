use crate::types::{Slot, NO_BUTTON};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Handshake token written to the sync RX characteristic after connecting
///
/// The controller starts emitting state notifications once it receives these
/// six ASCII bytes. No reply is read back.
pub const HANDSHAKE_TOKEN: &[u8; 6] = b"RideOn";

/// Base vibration pattern understood by the controller's haptic motor
pub const VIBRATION_BASE_PATTERN: [u8; 10] =
    [0x12, 0x12, 0x08, 0x0A, 0x06, 0x08, 0x02, 0x10, 0x00, 0x18];

/// Byte appended after the base vibration pattern
pub const VIBRATION_TERMINATOR: u8 = 0x20;

/// Vibration command size in bytes
pub const VIBRATION_COMMAND_SIZE: usize = VIBRATION_BASE_PATTERN.len() + 1;

/// Smallest frame that carries all three button slots
pub const MIN_FRAME_SIZE: usize = 5;

/// Build the handshake payload
#[must_use]
pub fn handshake_payload() -> Bytes {
    Bytes::from_static(HANDSHAKE_TOKEN)
}

/// Build the vibration command payload
#[must_use]
pub fn build_vibration_command() -> Bytes {
    let mut buf = BytesMut::with_capacity(VIBRATION_COMMAND_SIZE);
    buf.put_slice(&VIBRATION_BASE_PATTERN);
    buf.put_u8(VIBRATION_TERMINATOR);
    buf.freeze()
}

/// Button slots of a single controller state frame
///
/// Frame layout as observed on the async characteristic:
/// - Byte 0: message type
/// - Byte 1: field tag
/// - Bytes 2-4: one button code per slot, `0xFF` when released
/// - Remaining bytes: analog and pedal fields, not interpreted
///
/// Pressing several buttons at once yields codes that are not in the
/// mapping table; they are carried through untouched and simply never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    slots: [u8; 3],
}

impl ControllerState {
    /// State with every slot released
    pub const RELEASED: Self = Self {
        slots: [NO_BUTTON; 3],
    };

    /// Read the button slots from a raw frame
    ///
    /// Returns `None` for frames too short to carry the slots, such as the
    /// one- and three-byte keep-alives.
    #[must_use]
    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        if frame.len() < MIN_FRAME_SIZE {
            return None;
        }

        let mut buf = &frame[Slot::Two.offset()..];
        let slots = [buf.get_u8(), buf.get_u8(), buf.get_u8()];
        Some(Self { slots })
    }

    /// Button code held by a slot, `None` if released
    #[must_use]
    pub const fn code(&self, slot: Slot) -> Option<u8> {
        match self.slots[slot.index()] {
            NO_BUTTON => None,
            code => Some(code),
        }
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::RELEASED
    }
}

/// A button that was held in the previous frame and is released now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseEvent {
    /// Slot the button reported in
    pub slot: Slot,
    /// Code the slot held before release
    pub code: u8,
}

/// Turns consecutive controller frames into button release events
///
/// Events fire on release only, so a held button produces exactly one event
/// no matter how many frames report it.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    previous: ControllerState,
}

impl FrameDecoder {
    /// Create a decoder with every slot released
    #[must_use]
    pub const fn new() -> Self {
        Self {
            previous: ControllerState::RELEASED,
        }
    }

    /// Forget all tracked state
    pub fn reset(&mut self) {
        self.previous = ControllerState::RELEASED;
    }

    /// State tracked from the last accepted frame
    #[must_use]
    pub const fn previous(&self) -> ControllerState {
        self.previous
    }

    /// Feed one raw frame, returning the releases it completes
    ///
    /// Short frames are ignored and leave the tracked state untouched.
    pub fn decode(&mut self, frame: &[u8]) -> Vec<ReleaseEvent> {
        let Some(current) = ControllerState::from_frame(frame) else {
            return Vec::new();
        };

        let events = Slot::ALL
            .into_iter()
            .filter_map(|slot| match (self.previous.code(slot), current.code(slot)) {
                (Some(code), None) => Some(ReleaseEvent { slot, code }),
                _ => None,
            })
            .collect();

        self.previous = current;
        events
    }
}
