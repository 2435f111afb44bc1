use tracing::{debug, info};

use crate::{
    error::Result,
    keyboard::KeyboardOutput,
    mapping::ActionTable,
    protocol::ReleaseEvent,
    types::{Action, ButtonMapping},
};

/// Turns release events into keyboard output and haptic requests
pub struct Dispatcher<K> {
    table: ActionTable,
    keyboard: K,
    haptic_pending: bool,
}

impl<K: KeyboardOutput> Dispatcher<K> {
    /// Create a dispatcher over a mapping table
    pub const fn new(table: ActionTable, keyboard: K) -> Self {
        Self {
            table,
            keyboard,
            haptic_pending: false,
        }
    }

    /// Look up and dispatch a release event
    ///
    /// Returns the mapping that fired, or `None` for an unmapped code.
    ///
    /// # Errors
    ///
    /// Returns the keyboard error if the output could not be emitted.
    pub async fn handle_release(
        &mut self,
        event: ReleaseEvent,
    ) -> Result<Option<&'static ButtonMapping>> {
        let Some(mapping) = self.table.lookup(event.slot, event.code) else {
            debug!("No mapping for {} code 0x{:02X}", event.slot, event.code);
            return Ok(None);
        };

        self.dispatch(mapping).await?;
        Ok(Some(mapping))
    }

    /// Emit the action of a mapping and raise the haptic request
    ///
    /// # Errors
    ///
    /// Returns the keyboard error if the output could not be emitted.
    pub async fn dispatch(&mut self, mapping: &ButtonMapping) -> Result<()> {
        info!("Released {}: {}", mapping.description, mapping.action);

        match mapping.action {
            Action::KeyPress(key) => self.keyboard.press_key(key).await?,
            Action::MediaKey(key) => self.keyboard.press_media(key).await?,
        }

        self.haptic_pending = true;
        Ok(())
    }

    /// Check if a haptic pulse was requested
    #[must_use]
    pub const fn haptic_requested(&self) -> bool {
        self.haptic_pending
    }

    /// Read and clear the haptic request
    pub fn take_haptic_request(&mut self) -> bool {
        std::mem::take(&mut self.haptic_pending)
    }
}
