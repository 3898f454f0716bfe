//! xkey-engine library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the engine do? (for beginners)
//!
//! The engine sits between an X11 desktop and an abbreviation/hotkey
//! application (the *consumer*):
//!
//! 1. A capture backend (X RECORD, or the accessibility registry) reports
//!    every key press and mouse click.  The engine resolves the focused
//!    window's title and class and passes the event on to the consumer.
//! 2. Hotkeys are grabbed on the root window, or only on windows whose title
//!    or class matches a filter.  New windows are grabbed as they appear.
//! 3. The consumer asks the engine to type text.  Characters the keyboard
//!    layout cannot produce are given a spare keycode first.  Text can also
//!    be pasted through the clipboard.
//! 4. When the user changes the keyboard layout, every grab is released and
//!    the engine re-initializes against the new keymap.
//!
//! All requests to the X server go through one worker thread, so they are
//! executed strictly in the order they were issued.

/// Application layer: engine logic against abstract connection traits.
pub mod application;

/// Infrastructure layer: x11rb, clipboard, capture backends and storage.
pub mod infrastructure;

pub use application::consumer::{HotkeySource, InputConsumer, StaticHotkeys};
pub use application::engine::{EngineHandle, EngineSettings, InputEngine};
pub use application::error::EngineError;
