//! Clipboard access over `arboard`.
//!
//! On Linux both the `CLIPBOARD` and `PRIMARY` selections are available; on
//! other platforms only the clipboard exists and `Selection` falls back to
//! it.
//!
//! `arboard` serves X selections from a background thread owned by the
//! `Clipboard` value, so the value must outlive the paste.  The engine keeps
//! it for its whole lifetime, creating it on the worker thread through
//! [`system_clipboard_factory`].

use arboard::Clipboard;
#[cfg(target_os = "linux")]
use arboard::{GetExtLinux, LinuxClipboardKind, SetExtLinux};
use tracing::debug;

use crate::application::clipboard::{
    ClipboardAccess, ClipboardError, ClipboardFactory, ClipboardKind,
};

pub mod mock;

/// The desktop clipboard.
pub struct SystemClipboard {
    inner: Clipboard,
}

impl SystemClipboard {
    /// Opens the clipboard.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError::Unavailable`] when no clipboard service can
    /// be reached (e.g. no display).
    pub fn new() -> Result<Self, ClipboardError> {
        let inner = Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self { inner })
    }
}

/// A [`ClipboardFactory`] that opens the [`SystemClipboard`].
pub fn system_clipboard_factory() -> ClipboardFactory {
    Box::new(|| Ok(Box::new(SystemClipboard::new()?) as Box<dyn ClipboardAccess>))
}

fn read_result(result: Result<String, arboard::Error>) -> Result<Option<String>, ClipboardError> {
    match result {
        Ok(text) => Ok(Some(text)),
        Err(arboard::Error::ContentNotAvailable) => Ok(None),
        Err(e) => Err(ClipboardError::Access(e.to_string())),
    }
}

#[cfg(target_os = "linux")]
fn linux_kind(kind: ClipboardKind) -> LinuxClipboardKind {
    match kind {
        ClipboardKind::Clipboard => LinuxClipboardKind::Clipboard,
        ClipboardKind::Selection => LinuxClipboardKind::Primary,
    }
}

impl ClipboardAccess for SystemClipboard {
    fn get_text(&mut self, kind: ClipboardKind) -> Result<Option<String>, ClipboardError> {
        #[cfg(target_os = "linux")]
        let result = self.inner.get().clipboard(linux_kind(kind)).text();
        #[cfg(not(target_os = "linux"))]
        let result = {
            let _ = kind;
            self.inner.get_text()
        };
        read_result(result)
    }

    fn set_text(&mut self, kind: ClipboardKind, text: &str) -> Result<(), ClipboardError> {
        debug!("filling {kind:?} with {} characters", text.chars().count());
        #[cfg(target_os = "linux")]
        let result = self
            .inner
            .set()
            .clipboard(linux_kind(kind))
            .text(text.to_string());
        #[cfg(not(target_os = "linux"))]
        let result = {
            let _ = kind;
            self.inner.set_text(text.to_string())
        };
        result.map_err(|e| ClipboardError::Access(e.to_string()))
    }
}
