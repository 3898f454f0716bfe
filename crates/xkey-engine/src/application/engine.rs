//! The input engine facade.
//!
//! [`InputEngine::start`] loads the keymap, spawns the dispatcher worker and
//! the structural event listener, and returns the engine.  Consumers talk to
//! it through an [`EngineHandle`], a cheap clonable front for the command
//! queue.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//! start()
//!  ├─ KeyboardState::load          keymap + modifier masks (fails fast)
//!  ├─ spawn_worker                 grabs every hotkey, reports lock LEDs,
//!  │                               then executes queued commands
//!  └─ spawn_listener               window create/destroy, keymap changes
//! attach_backend(record | accessibility)
//! ... handle.send_string("…"), handle.grab_hotkey(item), ...
//! cancel()
//!  ├─ backend.stop()
//!  ├─ enqueue Shutdown, join worker (returns the connection)
//!  ├─ join listener
//!  └─ flush and drop the connection
//! ```
//!
//! Every handle method except the two window queries and `lookup_key` just
//! enqueues a command and returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};
use xkey_core::{HotkeyItem, Key, KeyCombo, KeyboardMapping, KeymapGuard, Modifier, WindowId};

use super::capture::{CaptureBackend, CaptureSink};
use super::clipboard::{ClipboardAccess, ClipboardError, ClipboardFactory, ClipboardKind};
use super::connection::{EventSource, KeyEventKind, ProtocolConnection};
use super::consumer::{HotkeySource, InputConsumer};
use super::dispatcher::{spawn_worker, Command, CommandExecutor, CommandQueue};
use super::error::EngineError;
use super::grab_hotkeys::HotkeyGrabManager;
use super::keyboard::{KeyboardState, SharedKeymap};
use super::listener::{spawn_listener, ListenerTiming};
use super::send_input::{
    send_key_half, send_keycode, send_string, send_with_modifiers, KeycodeRemapper, RepeatPacer,
    SlowRepeat,
};
use super::window_info::{window_class, window_info, window_title};

/// X button number of the middle button, which pastes the primary selection.
const MIDDLE_BUTTON: u8 = 2;

/// Runtime tunables of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Upper bound of one listener wait.
    pub poll_interval: Duration,
    /// Delay between a keymap change and re-initialization.
    pub keymap_settle: Duration,
    /// Delay before restoring the clipboard after a clipboard paste.
    pub clipboard_restore: Duration,
    /// Repeat global Super grabs on every window.
    pub super_workaround: bool,
    /// Windows where repeated keycodes are typed with a pause.
    pub slow_repeat: SlowRepeat,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            keymap_settle: Duration::from_millis(200),
            clipboard_restore: Duration::from_millis(100),
            super_workaround: false,
            slow_repeat: SlowRepeat::Off,
        }
    }
}

// ── Worker state ──────────────────────────────────────────────────────────────

/// Everything the worker owns that can be built on the caller's thread.
struct EngineCore {
    conn: Box<dyn ProtocolConnection>,
    keyboard: KeyboardState,
    grabs: HotkeyGrabManager,
    remapper: KeycodeRemapper,
    guard: Arc<Mutex<KeymapGuard>>,
    consumer: Arc<dyn InputConsumer>,
    hotkeys: Arc<dyn HotkeySource>,
    clipboard_restore: Duration,
    slow_repeat: SlowRepeat,
    pacer: RepeatPacer,
}

impl EngineCore {
    fn conn(&self) -> &dyn ProtocolConnection {
        self.conn.as_ref()
    }

    /// Grabs every hotkey and reports the lock LEDs.  Failures are logged.
    fn initialize(&mut self) {
        let items = self.hotkeys.hotkeys();
        self.grabs.grab_all(self.conn.as_ref(), &self.keyboard, &items);
        if let Err(e) = self.report_lock_state() {
            warn!("cannot read keyboard LEDs: {e}");
        }
        if let Err(e) = self.conn().flush() {
            warn!("flush after initialization failed: {e}");
        }
        info!(
            "{} hotkeys active ({} grabs)",
            items.iter().filter(|item| item.enabled).count(),
            self.grabs.grabs().len()
        );
    }

    fn reinitialize(&mut self) -> Result<(), EngineError> {
        let result = self.keyboard.reload(self.conn.as_ref());
        if result.is_ok() {
            self.remapper.clear();
            self.initialize();
        }
        let coalesced = lock(&self.guard).finish_reinit();
        if coalesced > 0 {
            debug!("{coalesced} keymap changes folded into this re-initialization");
        }
        result.map_err(EngineError::from)
    }

    fn report_lock_state(&self) -> Result<(), EngineError> {
        let leds = self.conn().led_mask()?;
        self.consumer.on_lock_state(Modifier::CapsLock, leds & 0x1 != 0);
        self.consumer.on_lock_state(Modifier::NumLock, leds & 0x2 != 0);
        Ok(())
    }

    fn send_key(&self, key: Key) -> Result<(), EngineError> {
        debug!("sending key {key}");
        let keycode = self.keyboard.require_keycode(key)?;
        let focus = self.conn().input_focus()?;
        send_keycode(self.conn(), focus, keycode, 0)
    }

    fn send_modified_key(&self, key: Key, modifiers: &[Modifier]) -> Result<(), EngineError> {
        debug!("sending modified key {modifiers:?} {key}");
        let keycode = self.keyboard.require_keycode(key)?;
        let focus = self.conn().input_focus()?;
        send_with_modifiers(self.conn(), &self.keyboard, focus, keycode, modifiers)
    }

    fn press_or_release(&self, key: Key, kind: KeyEventKind) -> Result<(), EngineError> {
        let focus = self.conn().input_focus()?;
        send_key_half(self.conn(), &self.keyboard, focus, key, kind)
    }

    fn fake_key(&self, key: Key, kinds: &[KeyEventKind]) -> Result<(), EngineError> {
        let keycode = self.keyboard.require_keycode(key)?;
        for &kind in kinds {
            self.conn().fake_key(kind, keycode)?;
        }
        Ok(())
    }

    fn grab_keyboard(&self) -> Result<(), EngineError> {
        let focus = self.conn().input_focus()?;
        self.conn().grab_keyboard(focus)?;
        self.conn().flush()?;
        Ok(())
    }

    fn ungrab_keyboard(&self) -> Result<(), EngineError> {
        self.conn().ungrab_keyboard()?;
        self.conn().flush()?;
        Ok(())
    }

    /// Clicks at `(x, y)`, relative to the focused window or the root, then
    /// puts the pointer back.
    fn mouse_click(&self, x: i16, y: i16, button: u8, relative: bool) -> Result<(), EngineError> {
        let conn = self.conn();
        let root = conn.root();
        let saved = conn.query_pointer(root)?;
        let target = if relative { conn.input_focus()? } else { root };

        conn.warp_pointer(target, x, y)?;
        self.click(button, x, y)?;
        conn.warp_pointer(root, saved.root_x, saved.root_y)?;
        conn.flush()?;
        Ok(())
    }

    /// Clicks at an offset from the current pointer position, then puts the
    /// pointer back.
    fn mouse_click_relative(&self, dx: i16, dy: i16, button: u8) -> Result<(), EngineError> {
        let conn = self.conn();
        let root = conn.root();
        let saved = conn.query_pointer(root)?;
        let x = saved.root_x.saturating_add(dx);
        let y = saved.root_y.saturating_add(dy);

        conn.warp_pointer(root, x, y)?;
        self.click(button, x, y)?;
        conn.warp_pointer(root, saved.root_x, saved.root_y)?;
        conn.flush()?;
        Ok(())
    }

    fn click(&self, button: u8, x: i16, y: i16) -> Result<(), EngineError> {
        self.conn().fake_button(KeyEventKind::Press, button, x, y)?;
        self.conn().fake_button(KeyEventKind::Release, button, x, y)?;
        Ok(())
    }

    fn handle_key_press(&self, keycode: u8) -> Result<(), EngineError> {
        if let Some(modifier) = self.keyboard.modifier_of(keycode) {
            self.consumer.on_modifier_down(modifier);
            return Ok(());
        }
        let focus = self.conn().input_focus()?;
        let title = window_title(self.conn(), focus, true);
        let class = window_class(self.conn(), focus, true);
        self.consumer.on_key_press(keycode, &title, &class);
        Ok(())
    }

    fn handle_key_release(&self, keycode: u8) {
        if let Some(modifier) = self.keyboard.modifier_of(keycode) {
            self.consumer.on_modifier_up(modifier);
        }
    }

    fn handle_mouse_button(
        &self,
        button: u8,
        x: Option<i16>,
        y: Option<i16>,
    ) -> Result<(), EngineError> {
        let conn = self.conn();
        let focus = conn.input_focus()?;
        let info = window_info(conn, focus, true);

        match (x, y) {
            (Some(x), Some(y)) => {
                let (rel_x, rel_y) = conn
                    .translate_coordinates(conn.root(), focus, x, y)
                    .unwrap_or_else(|e| {
                        debug!("cannot translate click position: {e}");
                        (0, 0)
                    });
                self.consumer.on_mouse_click(x, y, rel_x, rel_y, button, &info);
            }
            _ => {
                let pos = conn.query_pointer(focus)?;
                self.consumer
                    .on_mouse_click(pos.root_x, pos.root_y, pos.win_x, pos.win_y, button, &info);
            }
        }
        Ok(())
    }

    fn grab_for_window(&mut self, window: WindowId) -> Result<(), EngineError> {
        let items = self.hotkeys.hotkeys();
        self.grabs
            .grab_for_window(self.conn.as_ref(), &self.keyboard, &items, window);
        self.conn().flush()?;
        Ok(())
    }
}

enum ClipboardSlot {
    /// Not opened yet.
    Pending(ClipboardFactory),
    Ready(Box<dyn ClipboardAccess>),
    Failed,
}

/// The dispatcher's executor: the core plus the thread-bound clipboard.
struct EngineState {
    core: EngineCore,
    clipboard: ClipboardSlot,
}

impl EngineState {
    fn new(mut core: EngineCore, clipboard: ClipboardFactory) -> Self {
        core.initialize();
        Self {
            core,
            clipboard: ClipboardSlot::Pending(clipboard),
        }
    }

    /// Opens the clipboard on first use.
    fn clipboard(&mut self) -> Result<&mut dyn ClipboardAccess, EngineError> {
        let slot = std::mem::replace(&mut self.clipboard, ClipboardSlot::Failed);
        self.clipboard = match slot {
            ClipboardSlot::Pending(factory) => match factory() {
                Ok(clipboard) => ClipboardSlot::Ready(clipboard),
                Err(e) => {
                    warn!("clipboard unavailable, clipboard sends disabled: {e}");
                    ClipboardSlot::Failed
                }
            },
            other => other,
        };
        match &mut self.clipboard {
            ClipboardSlot::Ready(clipboard) => Ok(clipboard.as_mut()),
            _ => Err(ClipboardError::Unavailable("clipboard could not be opened".to_string()).into()),
        }
    }

    fn send_string_clipboard(&mut self, text: &str, paste: Option<&KeyCombo>) -> Result<(), EngineError> {
        debug!("sending string via clipboard: {text:?}");
        let Some(paste) = paste else {
            self.clipboard()?.set_text(ClipboardKind::Selection, text)?;
            let conn = self.core.conn();
            let pointer = conn.query_pointer(conn.root())?;
            self.core.click(MIDDLE_BUTTON, pointer.root_x, pointer.root_y)?;
            conn.flush()?;
            return Ok(());
        };

        let saved = {
            let clipboard = self.clipboard()?;
            let saved = clipboard
                .get_text(ClipboardKind::Clipboard)
                .unwrap_or_else(|e| {
                    debug!("cannot read clipboard before paste: {e}");
                    None
                })
                .unwrap_or_default();
            clipboard.set_text(ClipboardKind::Clipboard, text)?;
            saved
        };

        let modifiers: Vec<Modifier> = paste.modifiers.iter().copied().collect();
        self.core.send_modified_key(paste.key, &modifiers)?;
        self.core.conn().flush()?;

        if !saved.is_empty() {
            thread::sleep(self.core.clipboard_restore);
            self.clipboard()?
                .set_text(ClipboardKind::Clipboard, &saved)?;
        }
        Ok(())
    }
}

impl CommandExecutor for EngineState {
    type Output = Box<dyn ProtocolConnection>;

    fn execute(&mut self, command: Command) -> Result<(), EngineError> {
        trace!("executing {}", command.name());
        match command {
            Command::SendString(text) => {
                let core = &mut self.core;
                let paced = core.slow_repeat.applies(core.conn.as_ref());
                send_string(
                    core.conn.as_ref(),
                    &mut core.keyboard,
                    &mut core.remapper,
                    &core.guard,
                    &text,
                    paced.then_some(&mut core.pacer),
                )
            }
            Command::SendKey(key) => self.core.send_key(key),
            Command::SendModifiedKey { key, modifiers } => {
                self.core.send_modified_key(key, &modifiers)
            }
            Command::SendStringClipboard { text, paste } => {
                self.send_string_clipboard(&text, paste.as_ref())
            }
            Command::GrabHotkey(item) => {
                let core = &mut self.core;
                core.grabs.grab(core.conn.as_ref(), &core.keyboard, &item);
                core.conn().flush()?;
                Ok(())
            }
            Command::UngrabHotkey(item) => {
                let core = &mut self.core;
                core.grabs.ungrab(core.conn.as_ref(), &core.keyboard, &item);
                core.conn().flush()?;
                Ok(())
            }
            Command::GrabKeyboard => self.core.grab_keyboard(),
            Command::UngrabKeyboard => self.core.ungrab_keyboard(),
            Command::FakeKeypress(key) => self
                .core
                .fake_key(key, &[KeyEventKind::Press, KeyEventKind::Release]),
            Command::FakeKeydown(key) => self.core.fake_key(key, &[KeyEventKind::Press]),
            Command::FakeKeyup(key) => self.core.fake_key(key, &[KeyEventKind::Release]),
            Command::PressKey(key) => self.core.press_or_release(key, KeyEventKind::Press),
            Command::ReleaseKey(key) => self.core.press_or_release(key, KeyEventKind::Release),
            Command::MouseClick {
                x,
                y,
                button,
                relative,
            } => self.core.mouse_click(x, y, button, relative),
            Command::MouseClickRelative { dx, dy, button } => {
                self.core.mouse_click_relative(dx, dy, button)
            }
            Command::Flush => {
                self.core.pacer.reset();
                Ok(self.core.conn().flush()?)
            }
            Command::WindowTitle(reply) => {
                let conn = self.core.conn();
                let title = conn
                    .input_focus()
                    .map(|focus| window_title(conn, focus, true))
                    .unwrap_or_default();
                let _ = reply.send(title);
                Ok(())
            }
            Command::WindowClass(reply) => {
                let conn = self.core.conn();
                let class = conn
                    .input_focus()
                    .map(|focus| window_class(conn, focus, true))
                    .unwrap_or_default();
                let _ = reply.send(class);
                Ok(())
            }
            Command::KeyPress(keycode) => self.core.handle_key_press(keycode),
            Command::KeyRelease(keycode) => {
                self.core.handle_key_release(keycode);
                Ok(())
            }
            Command::MouseButton { button, x, y } => self.core.handle_mouse_button(button, x, y),
            Command::GrabForWindow(window) => self.core.grab_for_window(window),
            Command::ForgetWindow(window) => {
                self.core.grabs.forget_window(window);
                Ok(())
            }
            Command::UngrabAll => {
                self.core.grabs.ungrab_all(self.core.conn.as_ref());
                self.core.conn().flush()?;
                Ok(())
            }
            Command::Reinitialize => self.core.reinitialize(),
            Command::Shutdown => Ok(()),
        }
    }

    fn finish(self) -> Box<dyn ProtocolConnection> {
        self.core.conn
    }
}

fn lock(guard: &Mutex<KeymapGuard>) -> MutexGuard<'_, KeymapGuard> {
    guard.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Public facade ─────────────────────────────────────────────────────────────

/// Clonable front of a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    queue: CommandQueue,
    keymap: SharedKeymap,
    sending: Arc<AtomicBool>,
    worker: ThreadId,
}

impl EngineHandle {
    /// Types `text` into the focused window.
    pub fn send_string(&self, text: impl Into<String>) -> Result<(), EngineError> {
        self.queue.enqueue(Command::SendString(text.into()))
    }

    /// Pastes `text` through the clipboard with `paste` (e.g. `<ctrl>+v`),
    /// restoring the previous clipboard content afterwards.  Without a paste
    /// command the primary selection is filled and middle-clicked instead.
    pub fn send_string_clipboard(
        &self,
        text: impl Into<String>,
        paste: Option<KeyCombo>,
    ) -> Result<(), EngineError> {
        self.queue.enqueue(Command::SendStringClipboard {
            text: text.into(),
            paste,
        })
    }

    pub fn send_key(&self, key: Key) -> Result<(), EngineError> {
        self.queue.enqueue(Command::SendKey(key))
    }

    pub fn send_modified_key(
        &self,
        key: Key,
        modifiers: impl IntoIterator<Item = Modifier>,
    ) -> Result<(), EngineError> {
        self.queue.enqueue(Command::SendModifiedKey {
            key,
            modifiers: modifiers.into_iter().collect(),
        })
    }

    pub fn grab_hotkey(&self, item: HotkeyItem) -> Result<(), EngineError> {
        self.queue.enqueue(Command::GrabHotkey(item))
    }

    pub fn ungrab_hotkey(&self, item: HotkeyItem) -> Result<(), EngineError> {
        self.queue.enqueue(Command::UngrabHotkey(item))
    }

    /// Opens a send burst: grabs the keyboard on the focused window so the
    /// user's typing cannot interleave with synthesized keys.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SendInProgress`] if a burst is already open.
    pub fn begin_send(&self) -> Result<(), EngineError> {
        if self.sending.swap(true, Ordering::AcqRel) {
            return Err(EngineError::SendInProgress);
        }
        self.queue.enqueue(Command::GrabKeyboard).map_err(|e| {
            self.sending.store(false, Ordering::Release);
            e
        })
    }

    /// Closes the send burst opened by [`begin_send`](Self::begin_send).
    pub fn finish_send(&self) -> Result<(), EngineError> {
        self.sending.store(false, Ordering::Release);
        self.queue.enqueue(Command::UngrabKeyboard)
    }

    pub fn grab_keyboard(&self) -> Result<(), EngineError> {
        self.queue.enqueue(Command::GrabKeyboard)
    }

    pub fn ungrab_keyboard(&self) -> Result<(), EngineError> {
        self.queue.enqueue(Command::UngrabKeyboard)
    }

    /// Presses and releases `key` through XTEST.
    pub fn fake_keypress(&self, key: Key) -> Result<(), EngineError> {
        self.queue.enqueue(Command::FakeKeypress(key))
    }

    pub fn fake_keydown(&self, key: Key) -> Result<(), EngineError> {
        self.queue.enqueue(Command::FakeKeydown(key))
    }

    pub fn fake_keyup(&self, key: Key) -> Result<(), EngineError> {
        self.queue.enqueue(Command::FakeKeyup(key))
    }

    /// Sends a bare key press to the focused window.
    pub fn press_key(&self, key: Key) -> Result<(), EngineError> {
        self.queue.enqueue(Command::PressKey(key))
    }

    pub fn release_key(&self, key: Key) -> Result<(), EngineError> {
        self.queue.enqueue(Command::ReleaseKey(key))
    }

    /// Clicks `button` at `(x, y)`, relative to the focused window when
    /// `relative` is set, otherwise to the screen.
    pub fn send_mouse_click(
        &self,
        x: i16,
        y: i16,
        button: u8,
        relative: bool,
    ) -> Result<(), EngineError> {
        self.queue.enqueue(Command::MouseClick {
            x,
            y,
            button,
            relative,
        })
    }

    /// Clicks `button` at an offset from the current pointer position.
    pub fn send_mouse_click_relative(&self, dx: i16, dy: i16, button: u8) -> Result<(), EngineError> {
        self.queue
            .enqueue(Command::MouseClickRelative { dx, dy, button })
    }

    pub fn flush(&self) -> Result<(), EngineError> {
        self.queue.enqueue(Command::Flush)
    }

    /// Title of the focused window, waiting for the commands queued before
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::QueryFromWorker`] when called from a consumer
    /// callback, and [`EngineError::Stopped`] after cancellation.
    pub fn window_title(&self) -> Result<String, EngineError> {
        self.query(Command::WindowTitle)
    }

    /// Class (`"instance.class"`) of the focused window.  See
    /// [`window_title`](Self::window_title) for the errors.
    pub fn window_class(&self) -> Result<String, EngineError> {
        self.query(Command::WindowClass)
    }

    fn query(&self, make: fn(mpsc::Sender<String>) -> Command) -> Result<String, EngineError> {
        if thread::current().id() == self.worker {
            return Err(EngineError::QueryFromWorker);
        }
        let (tx, rx) = mpsc::channel();
        self.queue.enqueue(make(tx))?;
        rx.recv().map_err(|_| EngineError::Stopped)
    }

    /// Resolves a keycode to the key it produces under the current keymap.
    pub fn lookup_key(&self, keycode: u8, shifted: bool, numlock: bool, altgr: bool) -> Key {
        self.keymap
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup_key(keycode, shifted, numlock, altgr)
    }
}

impl CaptureSink for EngineHandle {
    fn on_key_down(&self, keycode: u8) {
        if self.queue.enqueue(Command::KeyPress(keycode)).is_err() {
            trace!("key press {keycode} dropped: engine stopped");
        }
    }

    fn on_key_up(&self, keycode: u8) {
        if self.queue.enqueue(Command::KeyRelease(keycode)).is_err() {
            trace!("key release {keycode} dropped: engine stopped");
        }
    }

    fn on_mouse_button(&self, button: u8, x: Option<i16>, y: Option<i16>) {
        if self
            .queue
            .enqueue(Command::MouseButton { button, x, y })
            .is_err()
        {
            trace!("button {button} dropped: engine stopped");
        }
    }
}

/// A running engine: worker, listener and (optionally) a capture backend.
pub struct InputEngine {
    handle: EngineHandle,
    worker: Option<JoinHandle<Box<dyn ProtocolConnection>>>,
    listener: Option<JoinHandle<()>>,
    listener_stop: Arc<AtomicBool>,
    backend: Option<Box<dyn CaptureBackend>>,
}

impl InputEngine {
    /// Loads the keymap and starts the worker and listener threads.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Connection`] if the keymap cannot be fetched,
    /// or [`EngineError::Spawn`] if a thread cannot be created.
    pub fn start(
        conn: Box<dyn ProtocolConnection>,
        events: Box<dyn EventSource>,
        consumer: Arc<dyn InputConsumer>,
        hotkeys: Arc<dyn HotkeySource>,
        clipboard: ClipboardFactory,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        let keymap: SharedKeymap = Arc::new(RwLock::new(KeyboardMapping::new(8, 1, Vec::new())));
        let keyboard = KeyboardState::load(conn.as_ref(), Arc::clone(&keymap))?;
        debug!(
            "keymap loaded: keycodes {}..={}, {} available for remapping",
            keyboard.mapping().min_keycode(),
            keyboard.mapping().max_keycode(),
            keyboard.available().len()
        );

        let guard = Arc::new(Mutex::new(KeymapGuard::new()));
        let core = EngineCore {
            conn,
            keyboard,
            grabs: HotkeyGrabManager::new(settings.super_workaround),
            remapper: KeycodeRemapper::new(),
            guard: Arc::clone(&guard),
            consumer,
            hotkeys,
            clipboard_restore: settings.clipboard_restore,
            slow_repeat: settings.slow_repeat,
            pacer: RepeatPacer::default(),
        };

        let (tx, rx) = mpsc::channel();
        let queue = CommandQueue::new(tx);
        let worker = spawn_worker(move || EngineState::new(core, clipboard), rx)?;
        let worker_id = worker.thread().id();

        let listener_stop = Arc::new(AtomicBool::new(false));
        let timing = ListenerTiming {
            poll_interval: settings.poll_interval,
            keymap_settle: settings.keymap_settle,
        };
        let listener = match spawn_listener(
            events,
            queue.clone(),
            guard,
            Arc::clone(&listener_stop),
            timing,
        ) {
            Ok(listener) => listener,
            Err(e) => {
                let _ = queue.enqueue(Command::Shutdown);
                let _ = worker.join();
                return Err(e);
            }
        };

        info!("input engine started");
        Ok(Self {
            handle: EngineHandle {
                queue,
                keymap,
                sending: Arc::new(AtomicBool::new(false)),
                worker: worker_id,
            },
            worker: Some(worker),
            listener: Some(listener),
            listener_stop,
            backend: None,
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Starts `backend`, delivering its events to this engine.  A previously
    /// attached backend is stopped first.
    pub fn attach_backend(&mut self, mut backend: Box<dyn CaptureBackend>) -> Result<(), EngineError> {
        if let Some(mut previous) = self.backend.take() {
            previous.stop();
        }
        backend.start(Arc::new(self.handle.clone()))?;
        info!("{} capture backend running", backend.name());
        self.backend = Some(backend);
        Ok(())
    }

    /// Stops capture, drains the worker and listener, and closes the
    /// connection.  Idempotent.
    pub fn cancel(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if let Some(mut backend) = self.backend.take() {
            backend.stop();
        }
        self.listener_stop.store(true, Ordering::Release);
        let _ = self.handle.queue.enqueue(Command::Shutdown);

        let conn = worker.join();
        if let Some(listener) = self.listener.take() {
            if listener.join().is_err() {
                error!("event listener panicked");
            }
        }
        match conn {
            Ok(conn) => {
                if let Err(e) = conn.flush() {
                    warn!("final flush failed: {e}");
                }
            }
            Err(_) => error!("dispatcher worker panicked"),
        }
        info!("input engine stopped");
    }
}

impl Drop for InputEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
