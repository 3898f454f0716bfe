//! The display server connection seam.
//!
//! [`ProtocolConnection`] is the narrow set of requests the engine issues to
//! the X server.  The production implementation wraps an `x11rb`
//! connection; tests use the in-memory server in
//! `infrastructure::connection::mock`.
//!
//! # Who calls what? (for beginners)
//!
//! Only the dispatcher worker thread holds the connection and calls these
//! methods.  Every other thread (capture backend, event listener, consumer
//! threads) talks to the worker through the command queue.  That is why the
//! trait needs `Send` (it moves into the worker) but not `Sync`.
//!
//! Structural notifications (window created/destroyed, keymap changed) arrive
//! through a separate [`EventSource`] polled by the listener thread.

use std::time::Duration;

use thiserror::Error;
use xkey_core::{KeyboardMapping, ModifierMapping, WindowId};

/// Error type for display server requests.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The display could not be opened.
    #[error("cannot connect to display: {0}")]
    Connect(String),

    /// A required protocol extension is not offered by the server.
    #[error("X server does not support the {extension} extension")]
    MissingExtension { extension: &'static str },

    /// A request failed or its reply could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The window no longer exists.
    #[error("bad window {0:#x}")]
    BadWindow(WindowId),
}

/// Text properties consulted when resolving a window title, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextProperty {
    /// `_NET_WM_VISIBLE_NAME`
    VisibleName,
    /// `_NET_WM_NAME`
    Name,
    /// `WM_NAME`
    LegacyName,
}

impl TextProperty {
    pub const LOOKUP_ORDER: [TextProperty; 3] = [
        TextProperty::VisibleName,
        TextProperty::Name,
        TextProperty::LegacyName,
    ];
}

/// Pointer position relative to the root window and to a queried window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerPosition {
    pub root_x: i16,
    pub root_y: i16,
    pub win_x: i16,
    pub win_y: i16,
}

/// Press or release, for synthetic key and button events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Press,
    Release,
}

/// Requests the engine issues to the display server.
pub trait ProtocolConnection: Send {
    /// The root window of the default screen.
    fn root(&self) -> WindowId;

    /// Fetches the full keyboard mapping.
    fn keyboard_mapping(&self) -> Result<KeyboardMapping, ConnectionError>;

    /// Fetches the modifier mapping (keycodes per modifier row).
    fn modifier_mapping(&self) -> Result<ModifierMapping, ConnectionError>;

    /// Replaces the KeySyms of the keycodes starting at `first_keycode`.
    ///
    /// `keysyms.len()` must be a multiple of `keysyms_per_keycode`.
    fn change_keyboard_mapping(
        &self,
        first_keycode: u8,
        keysyms_per_keycode: u8,
        keysyms: &[u32],
    ) -> Result<(), ConnectionError>;

    /// Keyboard LED bitmask (bit 0 CapsLock, bit 1 NumLock).
    fn led_mask(&self) -> Result<u32, ConnectionError>;

    /// The window holding the input focus (the root when nothing is focused).
    fn input_focus(&self) -> Result<WindowId, ConnectionError>;

    fn children(&self, window: WindowId) -> Result<Vec<WindowId>, ConnectionError>;

    /// The parent window, `None` for the root.
    fn parent(&self, window: WindowId) -> Result<Option<WindowId>, ConnectionError>;

    /// Reads a text property; `None` when unset or empty.
    fn text_property(
        &self,
        window: WindowId,
        property: TextProperty,
    ) -> Result<Option<String>, ConnectionError>;

    /// Reads `WM_CLASS` as `(instance, class)`.
    fn wm_class(&self, window: WindowId) -> Result<Option<(String, String)>, ConnectionError>;

    fn grab_key(&self, window: WindowId, keycode: u8, mask: u16) -> Result<(), ConnectionError>;

    fn ungrab_key(&self, window: WindowId, keycode: u8, mask: u16)
        -> Result<(), ConnectionError>;

    /// Grabs the whole keyboard on `window`.
    fn grab_keyboard(&self, window: WindowId) -> Result<(), ConnectionError>;

    fn ungrab_keyboard(&self) -> Result<(), ConnectionError>;

    /// Sends a synthetic key event directly to `window`.
    fn send_key_event(
        &self,
        window: WindowId,
        kind: KeyEventKind,
        keycode: u8,
        state: u16,
    ) -> Result<(), ConnectionError>;

    /// Injects a key event through XTEST, as if typed on the keyboard.
    fn fake_key(&self, kind: KeyEventKind, keycode: u8) -> Result<(), ConnectionError>;

    /// Injects a button event through XTEST at root coordinates `(x, y)`.
    fn fake_button(
        &self,
        kind: KeyEventKind,
        button: u8,
        x: i16,
        y: i16,
    ) -> Result<(), ConnectionError>;

    fn query_pointer(&self, window: WindowId) -> Result<PointerPosition, ConnectionError>;

    /// Translates `(x, y)` from `from`'s coordinate space into `to`'s.
    fn translate_coordinates(
        &self,
        from: WindowId,
        to: WindowId,
        x: i16,
        y: i16,
    ) -> Result<(i16, i16), ConnectionError>;

    /// Moves the pointer to `(x, y)` relative to `window`.
    fn warp_pointer(&self, window: WindowId, x: i16, y: i16) -> Result<(), ConnectionError>;

    fn flush(&self) -> Result<(), ConnectionError>;
}

/// Structural notifications from the display server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    WindowCreated(WindowId),
    WindowDestroyed(WindowId),
    /// The keyboard or modifier mapping changed.
    KeymapChanged,
}

/// A stream of [`DisplayEvent`]s, polled by the listener thread.
pub trait EventSource: Send {
    /// Waits up to `timeout` and returns every event that arrived, possibly
    /// none.
    fn wait_events(&mut self, timeout: Duration) -> Result<Vec<DisplayEvent>, ConnectionError>;
}
