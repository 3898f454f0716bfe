//! Capture backend seam.
//!
//! A capture backend receives raw key and mouse events from the OS and
//! forwards them to a [`CaptureSink`] (the engine handle), which queues them
//! for the dispatcher worker.
//!
//! | Backend          | Source                                   | Module                               |
//! |------------------|------------------------------------------|--------------------------------------|
//! | `record`         | X RECORD extension, device events        | `infrastructure::capture::record`    |
//! | `accessibility`  | AT-SPI registry keystroke/mouse events   | `infrastructure::capture::accessibility` |
//! | mock             | Events injected by tests                 | `infrastructure::capture::mock`      |
//!
//! Both production backends satisfy the same contract, so the binary picks
//! one at startup and falls back to the other when it is unavailable.

use std::sync::Arc;

use thiserror::Error;

/// Receives raw input from a capture backend.
pub trait CaptureSink: Send + Sync {
    fn on_key_down(&self, keycode: u8);

    fn on_key_up(&self, keycode: u8);

    /// A button press.  `x`/`y` are root coordinates when the backend knows
    /// them.
    fn on_mouse_button(&self, button: u8, x: Option<i16>, y: Option<i16>);
}

/// Error type for capture backends.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A required protocol extension is missing.
    #[error("X server does not support the {0} extension")]
    ExtensionMissing(&'static str),

    /// The accessibility registry cannot be reached.
    #[error("accessibility registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// The backend failed while setting up.
    #[error("failed to start capture: {0}")]
    Start(String),

    #[error("capture backend is already running")]
    AlreadyRunning,
}

/// A source of raw input events.
pub trait CaptureBackend: Send {
    /// Short name for logs (`"record"`, `"accessibility"`).
    fn name(&self) -> &'static str;

    /// Starts delivering events to `sink` on a backend-owned thread.
    fn start(&mut self, sink: Arc<dyn CaptureSink>) -> Result<(), CaptureError>;

    /// Stops delivery and joins the backend thread.  Idempotent.
    fn stop(&mut self);
}
