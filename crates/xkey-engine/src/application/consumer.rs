//! Collaborators the engine reports to and reads hotkeys from.
//!
//! - [`InputConsumer`] receives everything the user types and clicks.  In
//!   the full application this is the abbreviation engine (the "mediator");
//!   the binary ships a logging consumer.
//! - [`HotkeySource`] owns the hotkey definitions.  The engine only reads
//!   them when grabbing for a new window or after a keymap change.
//!
//! Callbacks run on the dispatcher worker thread.  They may enqueue further
//! commands through an [`EngineHandle`](super::engine::EngineHandle), but
//! must not block on a synchronous query (see
//! [`EngineError::QueryFromWorker`](super::error::EngineError::QueryFromWorker)).

use std::sync::{PoisonError, RwLock};

use xkey_core::{HotkeyItem, Modifier, WindowInfo};

/// Receives decoded user input from the engine.
#[cfg_attr(test, mockall::automock)]
pub trait InputConsumer: Send + Sync {
    fn on_modifier_down(&self, modifier: Modifier);

    fn on_modifier_up(&self, modifier: Modifier);

    /// Reports the initial (or re-initialized) state of a lock modifier.
    fn on_lock_state(&self, modifier: Modifier, on: bool);

    /// A non-modifier key was pressed in the window with `title` and `class`.
    ///
    /// Resolve the keycode to a key with
    /// [`EngineHandle::lookup_key`](super::engine::EngineHandle::lookup_key).
    fn on_key_press(&self, keycode: u8, title: &str, class: &str);

    /// A mouse button was pressed.  `rel_x`/`rel_y` are relative to the
    /// focused window.
    fn on_mouse_click(
        &self,
        root_x: i16,
        root_y: i16,
        rel_x: i16,
        rel_y: i16,
        button: u8,
        window: &WindowInfo,
    );
}

/// Supplies the current hotkey definitions.
pub trait HotkeySource: Send + Sync {
    fn hotkeys(&self) -> Vec<HotkeyItem>;
}

/// A [`HotkeySource`] backed by an in-memory list, e.g. loaded from the
/// configuration file.
#[derive(Debug, Default)]
pub struct StaticHotkeys {
    items: RwLock<Vec<HotkeyItem>>,
}

impl StaticHotkeys {
    pub fn new(items: Vec<HotkeyItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Replaces the list.  Existing grabs are not touched; call
    /// `ungrab_hotkey`/`grab_hotkey` for the items that changed.
    pub fn set(&self, items: Vec<HotkeyItem>) {
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = items;
    }
}

impl HotkeySource for StaticHotkeys {
    fn hotkeys(&self) -> Vec<HotkeyItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use xkey_core::Key;

    #[test]
    fn test_static_hotkeys_returns_replaced_list() {
        // Arrange
        let source = StaticHotkeys::new(vec![HotkeyItem::new(Key::Char('a'), [])]);

        // Act
        source.set(vec![
            HotkeyItem::new(Key::Char('b'), [Modifier::Control]),
            HotkeyItem::new(Key::Char('c'), []),
        ]);

        // Assert
        let items = source.hotkeys();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key, Key::Char('b'));
    }
}
