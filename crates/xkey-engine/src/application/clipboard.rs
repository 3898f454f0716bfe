//! Clipboard seam used by clipboard-based sending.
//!
//! X11 has two commonly used selections:
//!
//! | Kind        | X selection | Pasted with                      |
//! |-------------|-------------|----------------------------------|
//! | `Clipboard` | `CLIPBOARD` | the application's paste command  |
//! | `Selection` | `PRIMARY`   | a middle click                   |
//!
//! A selection is served by the process that owns it, so the clipboard object
//! must stay alive for as long as the pasted text may be requested.  The
//! engine therefore creates it once, on the worker thread, through a
//! [`ClipboardFactory`].

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardKind {
    Clipboard,
    Selection,
}

/// Error type for clipboard access.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("clipboard access failed: {0}")]
    Access(String),
}

/// Read/write access to the clipboard and primary selection.
pub trait ClipboardAccess {
    /// Returns the current text, `None` when empty or not text.
    fn get_text(&mut self, kind: ClipboardKind) -> Result<Option<String>, ClipboardError>;

    fn set_text(&mut self, kind: ClipboardKind, text: &str) -> Result<(), ClipboardError>;
}

/// Builds the clipboard on the thread that will use it.
pub type ClipboardFactory =
    Box<dyn FnOnce() -> Result<Box<dyn ClipboardAccess>, ClipboardError> + Send>;
