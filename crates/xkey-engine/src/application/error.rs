//! Engine-level error type.

use thiserror::Error;
use xkey_core::{Key, Modifier};

use super::capture::CaptureError;
use super::clipboard::ClipboardError;
use super::connection::ConnectionError;

/// Error type for engine operations and queued commands.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    /// No keycode in the current keymap produces the key.
    #[error("no keycode for {0}")]
    NoKeycode(Key),

    /// The modifier has no mask in the current modifier mapping.
    #[error("modifier {0} has no mask in the current keymap")]
    NoModifierMask(Modifier),

    /// The engine was cancelled; the command was dropped.
    #[error("engine stopped")]
    Stopped,

    /// A blocking query was made from the worker thread, which would
    /// deadlock.
    #[error("synchronous query issued from the dispatcher worker thread")]
    QueryFromWorker,

    /// `begin_send` was called while a send burst was already open.
    #[error("a send is already in progress")]
    SendInProgress,

    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
}
