use crate::types::{Action, ButtonMapping, MediaKey, Slot};

/// Space: pause
pub const KEY_PAUSE: char = ' ';
/// Hide or show the in-game UI
pub const KEY_HIDE_UI: char = 'u';
/// Shift down
pub const KEY_SHIFT_DOWN: char = 'i';
/// Shift up
pub const KEY_SHIFT_UP: char = 'k';
/// Hello emote
pub const KEY_HELLO: char = '2';
/// Battery low emote
pub const KEY_BATTERY_LOW: char = '6';
/// Thumbs up emote
pub const KEY_THUMBS_UP: char = '7';

const fn key(slot: Slot, code: u8, c: char, description: &'static str) -> ButtonMapping {
    ButtonMapping::new(slot, code, Action::KeyPress(c), description)
}

const fn media(slot: Slot, code: u8, media_key: MediaKey, description: &'static str) -> ButtonMapping {
    ButtonMapping::new(slot, code, Action::MediaKey(media_key), description)
}

/// Button bindings for the left and right handlebar controllers
pub const DEFAULT_MAPPINGS: &[ButtonMapping] = &[
    media(Slot::Two, 0xFD, MediaKey::VolumeUp, "Left controller up"),
    media(Slot::Two, 0xF7, MediaKey::VolumeDown, "Left controller down"),
    media(Slot::Two, 0xFE, MediaKey::PreviousTrack, "Left controller left"),
    media(Slot::Two, 0xFB, MediaKey::NextTrack, "Left controller right"),
    key(Slot::Two, 0xEF, KEY_HELLO, "Right controller A"),
    key(Slot::Two, 0xBF, KEY_HIDE_UI, "Right controller Y"),
    key(Slot::Two, 0xDF, KEY_BATTERY_LOW, "Right controller B"),
    media(Slot::Three, 0xEF, MediaKey::PlayPause, "Left controller power"),
    key(Slot::Three, 0xFD, KEY_SHIFT_DOWN, "Left controller side upper"),
    key(Slot::Three, 0xFB, KEY_SHIFT_DOWN, "Left controller side middle"),
    key(Slot::Three, 0xF7, KEY_SHIFT_DOWN, "Left controller side lower"),
    key(Slot::Three, 0xFE, KEY_THUMBS_UP, "Right controller Z"),
    key(Slot::Three, 0xDF, KEY_SHIFT_UP, "Right controller side upper"),
    key(Slot::Three, 0xBF, KEY_SHIFT_UP, "Right controller side middle"),
    key(Slot::Four, 0xFD, KEY_PAUSE, "Right controller power"),
    key(Slot::Four, 0xFE, KEY_SHIFT_UP, "Right controller side lower"),
];

/// Immutable lookup table from `(slot, code)` to an action
///
/// The table is small, so lookups are a linear scan. If two entries share a
/// `(slot, code)` pair the first one wins.
#[derive(Debug, Clone, Copy)]
pub struct ActionTable {
    mappings: &'static [ButtonMapping],
}

impl ActionTable {
    /// Table over the given mappings
    #[must_use]
    pub const fn new(mappings: &'static [ButtonMapping]) -> Self {
        Self { mappings }
    }

    /// Find the mapping for a released button
    #[must_use]
    pub fn lookup(&self, slot: Slot, code: u8) -> Option<&'static ButtonMapping> {
        self.mappings
            .iter()
            .find(|m| m.slot == slot && m.code == code)
    }

    /// All mappings in table order
    #[must_use]
    pub const fn mappings(&self) -> &'static [ButtonMapping] {
        self.mappings
    }

    /// Number of mappings
    #[must_use]
    pub const fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Check if the table has no mappings
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl Default for ActionTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAPPINGS)
    }
}
