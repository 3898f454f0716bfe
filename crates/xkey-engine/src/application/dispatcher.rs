//! The command queue and its single worker thread.
//!
//! # Why a single worker? (for beginners)
//!
//! The X connection is shared state: a grab issued halfway through a remap
//! pass, or a key press interleaved with another string, would corrupt what
//! the user sees.  Instead of locking, every mutating operation becomes a
//! [`Command`] value pushed onto an unbounded FIFO.  One worker thread owns
//! the connection and executes the commands one at a time, in submission
//! order.
//!
//! ```text
//!  consumer thread ──┐
//!  capture thread  ──┼──► CommandQueue (mpsc) ──► worker: executor.execute(cmd)
//!  listener thread ──┘
//! ```
//!
//! A failed or panicking command is logged and the loop carries on with the
//! next one.  [`Command::Shutdown`] ends the loop; the worker's result (the
//! connection, for the engine) goes back to whoever joins it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};
use xkey_core::{HotkeyItem, Key, KeyCombo, Modifier, WindowId};

use super::error::EngineError;

/// One queued operation.
#[derive(Debug)]
pub enum Command {
    // ── Consumer operations ──────────────────────────────────────────────────
    SendString(String),
    SendKey(Key),
    SendModifiedKey {
        key: Key,
        modifiers: Vec<Modifier>,
    },
    /// Paste `text` through the clipboard with `paste`, or through the
    /// primary selection and a middle click when `paste` is `None`.
    SendStringClipboard {
        text: String,
        paste: Option<KeyCombo>,
    },
    GrabHotkey(HotkeyItem),
    UngrabHotkey(HotkeyItem),
    GrabKeyboard,
    UngrabKeyboard,
    FakeKeypress(Key),
    FakeKeydown(Key),
    FakeKeyup(Key),
    PressKey(Key),
    ReleaseKey(Key),
    MouseClick {
        x: i16,
        y: i16,
        button: u8,
        relative: bool,
    },
    MouseClickRelative {
        dx: i16,
        dy: i16,
        button: u8,
    },
    Flush,

    // ── Synchronous queries ──────────────────────────────────────────────────
    WindowTitle(Sender<String>),
    WindowClass(Sender<String>),

    // ── Captured input ───────────────────────────────────────────────────────
    KeyPress(u8),
    KeyRelease(u8),
    MouseButton {
        button: u8,
        x: Option<i16>,
        y: Option<i16>,
    },

    // ── Listener bookkeeping ─────────────────────────────────────────────────
    GrabForWindow(WindowId),
    ForgetWindow(WindowId),
    UngrabAll,
    Reinitialize,

    /// Stops the worker.
    Shutdown,
}

impl Command {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SendString(_) => "send_string",
            Command::SendKey(_) => "send_key",
            Command::SendModifiedKey { .. } => "send_modified_key",
            Command::SendStringClipboard { .. } => "send_string_clipboard",
            Command::GrabHotkey(_) => "grab_hotkey",
            Command::UngrabHotkey(_) => "ungrab_hotkey",
            Command::GrabKeyboard => "grab_keyboard",
            Command::UngrabKeyboard => "ungrab_keyboard",
            Command::FakeKeypress(_) => "fake_keypress",
            Command::FakeKeydown(_) => "fake_keydown",
            Command::FakeKeyup(_) => "fake_keyup",
            Command::PressKey(_) => "press_key",
            Command::ReleaseKey(_) => "release_key",
            Command::MouseClick { .. } => "send_mouse_click",
            Command::MouseClickRelative { .. } => "send_mouse_click_relative",
            Command::Flush => "flush",
            Command::WindowTitle(_) => "window_title",
            Command::WindowClass(_) => "window_class",
            Command::KeyPress(_) => "key_press",
            Command::KeyRelease(_) => "key_release",
            Command::MouseButton { .. } => "mouse_button",
            Command::GrabForWindow(_) => "grab_for_window",
            Command::ForgetWindow(_) => "forget_window",
            Command::UngrabAll => "ungrab_all",
            Command::Reinitialize => "reinitialize",
            Command::Shutdown => "shutdown",
        }
    }
}

/// Sending half of the command FIFO.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: Sender<Command>,
}

impl CommandQueue {
    pub fn new(tx: Sender<Command>) -> Self {
        Self { tx }
    }

    /// Appends `command` and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Stopped`] once the worker has exited.
    pub fn enqueue(&self, command: Command) -> Result<(), EngineError> {
        self.tx.send(command).map_err(|_| EngineError::Stopped)
    }
}

/// Executes commands on the worker thread.
///
/// The executor is built on the worker thread itself, so it may hold values
/// that cannot cross threads.  What must come back to the caller is
/// returned by [`finish`](Self::finish).
pub trait CommandExecutor {
    type Output: Send + 'static;

    fn execute(&mut self, command: Command) -> Result<(), EngineError>;

    /// Consumes the executor once the loop has ended.
    fn finish(self) -> Self::Output;
}

/// Spawns the worker thread: builds the executor with `build`, then drains
/// `commands` into it.
///
/// The thread returns [`CommandExecutor::finish`] when it sees
/// [`Command::Shutdown`] or when every sender is gone.
///
/// # Errors
///
/// Returns [`EngineError::Spawn`] if the OS refuses to create the thread.
pub fn spawn_worker<E, F>(
    build: F,
    commands: Receiver<Command>,
) -> Result<JoinHandle<E::Output>, EngineError>
where
    E: CommandExecutor,
    F: FnOnce() -> E + Send + 'static,
{
    thread::Builder::new()
        .name("xkey-worker".to_string())
        .spawn(move || {
            let mut executor = build();
            run_worker(&mut executor, &commands);
            executor.finish()
        })
        .map_err(EngineError::Spawn)
}

fn run_worker<E: CommandExecutor>(executor: &mut E, commands: &Receiver<Command>) {
    for command in commands.iter() {
        if matches!(command, Command::Shutdown) {
            debug!("dispatcher worker shutting down");
            return;
        }
        let name = command.name();
        match panic::catch_unwind(AssertUnwindSafe(|| executor.execute(command))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("command {name} failed: {e}"),
            Err(_) => error!("command {name} panicked; continuing with the next command"),
        }
    }
    debug!("command queue closed; dispatcher worker exiting");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
