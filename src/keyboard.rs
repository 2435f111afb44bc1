//! Keyboard output collaborators.
//!
//! The bridge only needs two operations from a keyboard: type one character
//! and send one consumer-control media key. Everything about how the host
//! receives those events lives behind [`KeyboardOutput`].

use async_trait::async_trait;
use tracing::info;

use crate::{error::Result, types::MediaKey};

/// Sink for decoded button actions
#[async_trait]
pub trait KeyboardOutput: Send + Sync {
    /// Type a single literal character
    async fn press_key(&self, key: char) -> Result<()>;

    /// Send a consumer-control media key
    async fn press_media(&self, key: MediaKey) -> Result<()>;
}

/// Keyboard that only reports events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogKeyboard;

#[async_trait]
impl KeyboardOutput for LogKeyboard {
    async fn press_key(&self, key: char) -> Result<()> {
        info!("Key press: {:?}", key);
        Ok(())
    }

    async fn press_media(&self, key: MediaKey) -> Result<()> {
        info!("Media key: {} (usage 0x{:02X})", key, key.usage_id());
        Ok(())
    }
}

#[cfg(feature = "desktop")]
pub use desktop::EnigoKeyboard;

#[cfg(feature = "desktop")]
mod desktop {
    use super::KeyboardOutput;
    use crate::{
        error::{Result, RideError},
        types::MediaKey,
    };
    use async_trait::async_trait;
    use enigo::{Direction, Enigo, Key, Keyboard, Settings};
    use std::sync::Mutex;
    use tracing::debug;

    /// Keyboard that injects events into the local desktop session
    pub struct EnigoKeyboard {
        enigo: Mutex<Enigo>,
    }

    impl EnigoKeyboard {
        /// Connect to the desktop input system
        ///
        /// # Errors
        ///
        /// Returns [`RideError::Keyboard`] if the input backend is unavailable.
        pub fn new() -> Result<Self> {
            let enigo =
                Enigo::new(&Settings::default()).map_err(|e| RideError::Keyboard(e.to_string()))?;
            Ok(Self {
                enigo: Mutex::new(enigo),
            })
        }

        fn click(&self, key: Key) -> Result<()> {
            let mut enigo = self
                .enigo
                .lock()
                .map_err(|_| RideError::Keyboard("input backend poisoned".to_string()))?;
            enigo
                .key(key, Direction::Click)
                .map_err(|e| RideError::Keyboard(e.to_string()))
        }
    }

    const fn media_key(key: MediaKey) -> Key {
        match key {
            MediaKey::VolumeUp => Key::VolumeUp,
            MediaKey::VolumeDown => Key::VolumeDown,
            MediaKey::PreviousTrack => Key::MediaPrevTrack,
            MediaKey::NextTrack => Key::MediaNextTrack,
            MediaKey::PlayPause => Key::MediaPlayPause,
        }
    }

    #[async_trait]
    impl KeyboardOutput for EnigoKeyboard {
        async fn press_key(&self, key: char) -> Result<()> {
            debug!("Injecting key {:?}", key);
            self.click(Key::Unicode(key))
        }

        async fn press_media(&self, key: MediaKey) -> Result<()> {
            debug!("Injecting media key {}", key);
            self.click(media_key(key))
        }
    }
}
