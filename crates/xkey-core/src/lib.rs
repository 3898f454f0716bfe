//! # xkey-core
//!
//! Shared library for the xkey input engine containing key names, X11 keymap
//! tables, hotkey domain types and the RECORD extension decoder.
//!
//! It has zero dependencies on the display server connection, so everything
//! here can be tested on a machine without X11.
//!
//! # Architecture overview (for beginners)
//!
//! xkey watches the keyboard and mouse of an X11 desktop, reports what the
//! user types to an abbreviation engine, and types text back on its behalf.
//! It also grabs global hotkeys, optionally only in windows whose title or
//! class matches a filter.
//!
//! This crate (`xkey-core`) is the pure foundation.  It defines:
//!
//! - **`keymap`** – How keys are named (`<ctrl>`, `<f5>`, `é`), how names map
//!   to X11 KeySyms, and snapshots of the server keymap used to find the
//!   keycode (and Shift/AltGr level) that produces a character.
//!
//! - **`domain`** – Hotkey items and window filters, the table of grabs held,
//!   the remap planner that borrows empty keycodes for characters the layout
//!   cannot type, and the state machine that debounces keymap changes.
//!
//! - **`protocol`** – Decoding of raw 32-byte device events delivered by the
//!   RECORD extension.
//!
//! The `xkey-engine` crate drives all of this against a live connection.

pub mod domain;
pub mod keymap;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `xkey_core::HotkeyItem` instead of `xkey_core::domain::hotkey::HotkeyItem`.
pub use domain::{
    FilterError, Grab, GrabTable, GuardState, HotkeyItem, KeymapAction, KeymapGuard, RemapTable,
    WindowFilter, WindowId, WindowInfo,
};
pub use keymap::{
    Key, KeyCombo, KeyParseError, KeyboardMapping, Modifier, ModifierMapping, ModifierMaskTable,
    NamedKey,
};
pub use protocol::{decode_device_events, DeviceEvent};
