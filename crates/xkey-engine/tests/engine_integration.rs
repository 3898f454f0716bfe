//! Integration tests for the input engine.
//!
//! # Purpose
//!
//! These tests run a real [`InputEngine`] (worker thread, listener thread
//! and all) against the in-memory X server from
//! `infrastructure::connection::mock`, an in-memory clipboard and a mock
//! capture backend.  They verify what a user of the engine can observe:
//!
//! - Hotkey grabs on the root and on matching windows, including the
//!   Caps Lock / Num Lock variants, and their release.
//! - Typed strings, remapping of characters the layout lacks, and the
//!   order in which queued commands reach the display.
//! - Re-initialization after an external keymap change.
//! - Captured input reaching the consumer with the focused window's title
//!   and class.
//! - Clipboard pastes and clean shutdown.
//!
//! # Synchronizing with the worker
//!
//! Every handle method returns as soon as its command is queued.  The
//! window queries go through the same FIFO, so calling
//! `handle.window_title()` waits until everything queued before it has run:
//!
//! ```rust,ignore
//! handle.send_string("hello")?;
//! handle.window_title()?;          // "hello" has been typed now
//! ```
//!
//! Events that originate on the display side (new windows, keymap changes)
//! travel through the listener thread first; those tests poll with
//! [`wait_until`].

use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use xkey_core::{HotkeyItem, Key, KeyCombo, Modifier, NamedKey, WindowFilter, WindowInfo};
use xkey_engine::application::clipboard::ClipboardKind;
use xkey_engine::application::connection::KeyEventKind;
use xkey_engine::application::send_input::SlowRepeat;
use xkey_engine::infrastructure::capture::mock::MockCaptureBackend;
use xkey_engine::infrastructure::clipboard::mock::MemoryClipboard;
use xkey_engine::infrastructure::connection::mock::{MockDisplay, SentEvent, MOCK_ROOT};
use xkey_engine::{
    EngineError, EngineHandle, EngineSettings, InputConsumer, InputEngine, StaticHotkeys,
};

const F5: u8 = 71;
const CTRL: u16 = 0x04;
const CAPS: u16 = 0x02;
const NUM: u16 = 0x10;
const ESCAPE: u8 = 9;

// ── Test doubles ──────────────────────────────────────────────────────────────

/// Records every consumer callback as a short line of text.
///
/// A press of Escape makes the consumer try a synchronous window query from
/// inside the callback, and record how it went.
#[derive(Default)]
struct Recorder {
    lines: Mutex<Vec<String>>,
    handle: OnceLock<EngineHandle>,
    query_from_callback: Mutex<Option<Result<String, EngineError>>>,
}

impl Recorder {
    fn push(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.lines().iter().filter(|l| l.starts_with(prefix)).count()
    }
}

impl InputConsumer for Recorder {
    fn on_modifier_down(&self, modifier: Modifier) {
        self.push(format!("down {modifier:?}"));
    }

    fn on_modifier_up(&self, modifier: Modifier) {
        self.push(format!("up {modifier:?}"));
    }

    fn on_lock_state(&self, modifier: Modifier, on: bool) {
        self.push(format!("lock {modifier:?} {on}"));
    }

    fn on_key_press(&self, keycode: u8, title: &str, class: &str) {
        if keycode == ESCAPE {
            if let Some(handle) = self.handle.get() {
                *self.query_from_callback.lock().unwrap() = Some(handle.window_title());
            }
        }
        self.push(format!("press {keycode} {title:?} {class:?}"));
    }

    fn on_mouse_click(
        &self,
        root_x: i16,
        root_y: i16,
        rel_x: i16,
        rel_y: i16,
        button: u8,
        window: &WindowInfo,
    ) {
        self.push(format!(
            "click {button} at {root_x},{root_y} rel {rel_x},{rel_y} in {:?}",
            window.title
        ));
    }
}

// ── Fixture ───────────────────────────────────────────────────────────────────

struct Fixture {
    display: MockDisplay,
    clipboard: MemoryClipboard,
    capture: MockCaptureBackend,
    recorder: Arc<Recorder>,
    engine: InputEngine,
    handle: EngineHandle,
}

fn fast_settings() -> EngineSettings {
    EngineSettings {
        poll_interval: Duration::from_millis(10),
        keymap_settle: Duration::from_millis(5),
        clipboard_restore: Duration::from_millis(5),
        super_workaround: false,
        slow_repeat: SlowRepeat::Off,
    }
}

fn start(display: MockDisplay, clipboard: MemoryClipboard, hotkeys: Vec<HotkeyItem>) -> Fixture {
    start_with(display, clipboard, hotkeys, fast_settings())
}

fn start_with(
    display: MockDisplay,
    clipboard: MemoryClipboard,
    hotkeys: Vec<HotkeyItem>,
    settings: EngineSettings,
) -> Fixture {
    let recorder = Arc::new(Recorder::default());
    let mut engine = InputEngine::start(
        Box::new(display.clone()),
        Box::new(display.event_source()),
        recorder.clone(),
        Arc::new(StaticHotkeys::new(hotkeys)),
        clipboard.factory(),
        settings,
    )
    .unwrap();
    let handle = engine.handle();
    recorder.handle.set(handle.clone()).ok();

    let capture = MockCaptureBackend::new();
    engine.attach_backend(Box::new(capture.clone())).unwrap();

    Fixture {
        display,
        clipboard,
        capture,
        recorder,
        engine,
        handle,
    }
}

impl Fixture {
    /// Waits until every command queued so far has run.
    fn sync(&self) {
        self.handle.window_title().unwrap();
    }
}

fn ctrl_f5() -> HotkeyItem {
    HotkeyItem::new(Key::Named(NamedKey::F5), [Modifier::Control])
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ── Startup and hotkey grabs ──────────────────────────────────────────────────

/// Startup grabs a global hotkey on the root once per lock-key combination
/// and reports the lock LEDs.
#[test]
fn test_startup_grabs_global_hotkey_with_lock_variants() {
    let display = MockDisplay::new();
    display.set_led_mask(0b01);

    let fx = start(display, MemoryClipboard::new(), vec![ctrl_f5()]);
    fx.sync();

    for mask in [CTRL, CTRL | NUM, CTRL | CAPS, CTRL | CAPS | NUM] {
        assert!(fx.display.has_grab(MOCK_ROOT, F5, mask), "mask {mask:#x}");
    }
    assert_eq!(fx.display.grabs().len(), 4);
    assert_eq!(
        fx.recorder.lines(),
        vec!["lock CapsLock true", "lock NumLock false"]
    );
}

#[test]
fn test_filtered_hotkey_grabs_exactly_the_matching_windows() {
    let display = MockDisplay::new();
    let editor = display.add_window(MOCK_ROOT, "notes - Editor", ("editor", "Editor"));
    let _terminal = display.add_window(MOCK_ROOT, "bash", ("term", "Term"));
    let item = ctrl_f5().with_filter(WindowFilter::new("notes").unwrap());

    let fx = start(display, MemoryClipboard::new(), vec![item]);
    fx.sync();

    assert_eq!(fx.display.grabbed_windows().into_iter().collect::<Vec<_>>(), vec![editor]);
    assert_eq!(fx.display.grabs().len(), 4);
}

#[test]
fn test_disabled_hotkey_is_not_grabbed_at_startup() {
    let fx = start(
        MockDisplay::new(),
        MemoryClipboard::new(),
        vec![ctrl_f5().with_enabled(false)],
    );
    fx.sync();

    assert!(fx.display.grabs().is_empty());
}

/// Grabbing then ungrabbing through the handle leaves no grab behind, and
/// repeating either operation is harmless.
#[test]
fn test_grab_and_ungrab_hotkey_through_the_handle() {
    let fx = start(MockDisplay::new(), MemoryClipboard::new(), Vec::new());

    fx.handle.grab_hotkey(ctrl_f5()).unwrap();
    fx.handle.grab_hotkey(ctrl_f5()).unwrap();
    fx.sync();
    let grabbed = fx.display.grabs().len();

    fx.handle.ungrab_hotkey(ctrl_f5()).unwrap();
    fx.handle.ungrab_hotkey(ctrl_f5()).unwrap();
    fx.sync();

    assert_eq!(grabbed, 4);
    assert!(fx.display.grabs().is_empty());
}

#[test]
fn test_new_window_receives_filtered_grabs() {
    let item = ctrl_f5().with_filter(WindowFilter::new("Editor").unwrap());
    let fx = start(MockDisplay::new(), MemoryClipboard::new(), vec![item]);
    fx.sync();
    assert!(fx.display.grabs().is_empty());

    let window = fx
        .display
        .create_window(MOCK_ROOT, "Editor", ("editor", "Editor"));
    let unrelated = fx.display.create_window(MOCK_ROOT, "bash", ("term", "Term"));

    assert!(wait_until(|| fx.display.has_grab(window, F5, CTRL)));
    fx.sync();
    assert!(!fx.display.grabbed_windows().contains(&unrelated));
}

// ── Sending ───────────────────────────────────────────────────────────────────

/// A string the layout can type goes out as one press and release per
/// character, with no keymap change.
#[test]
fn test_native_string_is_typed_without_remapping() {
    let fx = start(MockDisplay::new(), MemoryClipboard::new(), Vec::new());

    fx.handle.send_string("hello").unwrap();
    fx.sync();

    assert_eq!(fx.display.typed_keycodes(), vec![43, 26, 46, 46, 32]);
    assert_eq!(fx.display.events().len(), 10);
    assert_eq!(fx.display.mapping_change_count(), 0);
}

/// Characters remapped by an earlier send stay typeable when a later send
/// needs another remap pass.
#[test]
fn test_second_remap_pass_keeps_earlier_characters() {
    let fx = start(MockDisplay::new(), MemoryClipboard::new(), Vec::new());

    fx.handle.send_string("é").unwrap();
    fx.sync();
    fx.display.clear_events();
    fx.handle.send_string("éü").unwrap();
    fx.sync();

    assert_eq!(fx.display.typed_keycodes(), vec![8, 50, 8]);
    assert_eq!(fx.display.keysyms_of(8), vec!['é' as u32, 'ü' as u32]);
}

/// Windows matching the slow-repeat pattern get a flush before a repeated
/// keycode; other windows do not.
#[test]
fn test_slow_repeat_flushes_only_in_matching_windows() {
    let display = MockDisplay::new();
    let vm = display.add_window(MOCK_ROOT, "Ubuntu - Oracle VirtualBox", ("", ""));
    let editor = display.add_window(MOCK_ROOT, "Editor", ("", ""));
    let settings = EngineSettings {
        slow_repeat: SlowRepeat::For(WindowFilter::new(".*VirtualBox.*").unwrap()),
        ..fast_settings()
    };
    let fx = start_with(display, MemoryClipboard::new(), Vec::new(), settings);
    fx.sync();

    fx.display.set_focus(editor);
    let before = fx.display.flush_count();
    fx.handle.send_string("ll").unwrap();
    fx.sync();
    let in_editor = fx.display.flush_count() - before;

    fx.display.set_focus(vm);
    let before = fx.display.flush_count();
    fx.handle.send_string("ll").unwrap();
    fx.sync();
    let in_vm = fx.display.flush_count() - before;

    assert_eq!(in_editor, 0);
    assert_eq!(in_vm, 1);
    assert_eq!(fx.display.typed_keycodes(), vec![46, 46, 46, 46]);
}

#[test]
fn test_queued_commands_reach_the_display_in_submission_order() {
    let fx = start(MockDisplay::new(), MemoryClipboard::new(), Vec::new());

    fx.handle.send_string("ab").unwrap();
    fx.handle.send_key(Key::Named(NamedKey::F5)).unwrap();
    fx.handle.send_string("cd").unwrap();
    fx.sync();

    assert_eq!(fx.display.typed_keycodes(), vec![38, 56, F5, 54, 40]);
}

/// A character missing from the layout is remapped onto the first spare
/// keycode once.  The server's echo of that change does not trigger a
/// re-initialization.
#[test]
fn test_missing_character_is_remapped_once() {
    let fx = start(MockDisplay::new(), MemoryClipboard::new(), Vec::new());
    fx.sync();
    let lock_reports = fx.recorder.count("lock");

    fx.handle.send_string("é").unwrap();
    fx.handle.send_string("é").unwrap();
    fx.sync();
    thread::sleep(Duration::from_millis(100));
    fx.sync();

    assert_eq!(fx.display.mapping_change_count(), 1);
    assert_eq!(fx.display.keysyms_of(8)[0], 'é' as u32);
    assert_eq!(fx.display.typed_keycodes(), vec![8, 8]);
    assert_eq!(fx.recorder.count("lock"), lock_reports);
}

#[test]
fn test_modified_key_holds_modifiers_around_the_key() {
    let fx = start(MockDisplay::new(), MemoryClipboard::new(), Vec::new());

    fx.handle
        .send_modified_key(Key::Char('s'), [Modifier::Control, Modifier::Shift])
        .unwrap();
    fx.sync();

    let presses: Vec<(KeyEventKind, u8, u16)> = fx
        .display
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SentEvent::Key {
                kind,
                keycode,
                state,
                ..
            } => Some((kind, keycode, state)),
            _ => None,
        })
        .collect();
    assert_eq!(
        presses,
        vec![
            (KeyEventKind::Press, 37, 0),
            (KeyEventKind::Press, 50, 0),
            (KeyEventKind::Press, 39, CTRL | 0x01),
            (KeyEventKind::Release, 39, CTRL | 0x01),
            (KeyEventKind::Release, 50, 0),
            (KeyEventKind::Release, 37, 0),
        ]
    );
}

#[test]
fn test_fake_keypress_goes_through_xtest() {
    let fx = start(MockDisplay::new(), MemoryClipboard::new(), Vec::new());

    fx.handle.fake_keypress(Key::Char('a')).unwrap();
    fx.sync();

    assert_eq!(
        fx.display.events(),
        vec![
            SentEvent::FakeKey {
                kind: KeyEventKind::Press,
                keycode: 38
            },
            SentEvent::FakeKey {
                kind: KeyEventKind::Release,
                keycode: 38
            },
        ]
    );
}

#[test]
fn test_mouse_click_puts_the_pointer_back() {
    let display = MockDisplay::new();
    display.set_pointer(5, 5);
    let fx = start(display, MemoryClipboard::new(), Vec::new());

    fx.handle.send_mouse_click(100, 50, 1, false).unwrap();
    fx.sync();

    assert_eq!(
        fx.display.events(),
        vec![
            SentEvent::Warp {
                window: MOCK_ROOT,
                x: 100,
                y: 50
            },
            SentEvent::FakeButton {
                kind: KeyEventKind::Press,
                button: 1,
                x: 100,
                y: 50
            },
            SentEvent::FakeButton {
                kind: KeyEventKind::Release,
                button: 1,
                x: 100,
                y: 50
            },
            SentEvent::Warp {
                window: MOCK_ROOT,
                x: 5,
                y: 5
            },
        ]
    );
    assert_eq!(fx.display.pointer(), (5, 5));
}

// ── Send bursts and queries ───────────────────────────────────────────────────

#[test]
fn test_begin_send_is_not_reentrant() {
    let display = MockDisplay::new();
    let editor = display.add_window(MOCK_ROOT, "Editor", ("", ""));
    display.set_focus(editor);
    let fx = start(display, MemoryClipboard::new(), Vec::new());

    fx.handle.begin_send().unwrap();
    let second = fx.handle.begin_send();
    fx.sync();
    let grabbed = fx.display.keyboard_grab();

    fx.handle.finish_send().unwrap();
    fx.sync();

    assert!(matches!(second, Err(EngineError::SendInProgress)));
    assert_eq!(grabbed, Some(editor));
    assert_eq!(fx.display.keyboard_grab(), None);
    assert!(fx.handle.begin_send().is_ok());
}

#[test]
fn test_window_queries_traverse_to_the_labelled_frame() {
    let display = MockDisplay::new();
    let frame = display.add_window(MOCK_ROOT, "notes - Editor", ("editor", "Editor"));
    let client = display.add_window(frame, "", ("", ""));
    display.set_focus(client);
    let fx = start(display, MemoryClipboard::new(), Vec::new());

    assert_eq!(fx.handle.window_title().unwrap(), "notes - Editor");
    assert_eq!(fx.handle.window_class().unwrap(), "editor.Editor");
}

/// A consumer callback runs on the worker; a blocking query from there is
/// refused instead of deadlocking.
#[test]
fn test_query_from_a_consumer_callback_is_rejected() {
    let fx = start(MockDisplay::new(), MemoryClipboard::new(), Vec::new());

    fx.capture.press(ESCAPE);
    fx.sync();

    let outcome = fx.recorder.query_from_callback.lock().unwrap().take();
    assert!(matches!(outcome, Some(Err(EngineError::QueryFromWorker))));
}

// ── Captured input ────────────────────────────────────────────────────────────

#[test]
fn test_captured_keys_reach_the_consumer_with_window_info() {
    let display = MockDisplay::new();
    let editor = display.add_window(MOCK_ROOT, "notes - Editor", ("editor", "Editor"));
    display.set_focus(editor);
    let fx = start(display, MemoryClipboard::new(), Vec::new());
    fx.sync();

    fx.capture.press(50);
    fx.capture.press(38);
    fx.capture.release(38);
    fx.capture.release(50);
    fx.sync();

    let lines = fx.recorder.lines();
    assert_eq!(
        lines[lines.len() - 3..],
        [
            "down Shift".to_string(),
            "press 38 \"notes - Editor\" \"editor.Editor\"".to_string(),
            "up Shift".to_string(),
        ]
    );
    assert_eq!(fx.handle.lookup_key(38, true, false, false), Key::Char('A'));
}

#[test]
fn test_captured_click_reports_window_relative_position() {
    let display = MockDisplay::new();
    let editor = display.add_window(MOCK_ROOT, "Editor", ("", ""));
    display.set_origin(editor, 100, 100);
    display.set_focus(editor);
    let fx = start(display, MemoryClipboard::new(), Vec::new());

    fx.capture.click(1, Some((150, 120)));
    fx.sync();

    assert_eq!(
        fx.recorder.lines().last().unwrap(),
        "click 1 at 150,120 rel 50,20 in \"Editor\""
    );
}

// ── Keymap changes ────────────────────────────────────────────────────────────

/// An external keymap change releases every grab and re-grabs against the
/// new keymap: F5 now also lives on keycode 8, which comes first.
#[test]
fn test_external_keymap_change_reinitializes_grabs() {
    let fx = start(MockDisplay::new(), MemoryClipboard::new(), vec![ctrl_f5()]);
    fx.sync();
    assert!(fx.display.has_grab(MOCK_ROOT, F5, CTRL));

    fx.display.remap_externally(8, &[0xFFC2]);

    assert!(wait_until(|| fx.display.has_grab(MOCK_ROOT, 8, CTRL)));
    fx.sync();
    assert!(!fx.display.has_grab(MOCK_ROOT, F5, CTRL));
    assert_eq!(fx.display.grabs().len(), 4);
    assert_eq!(fx.recorder.count("lock CapsLock"), 2);
}

// ── Clipboard ─────────────────────────────────────────────────────────────────

/// A clipboard paste saves the previous contents, pastes, then restores
/// them.
#[test]
fn test_clipboard_paste_restores_previous_contents() {
    let clipboard = MemoryClipboard::with_text("old");
    let fx = start(MockDisplay::new(), clipboard, Vec::new());
    let paste = KeyCombo::new(Key::Char('v'), [Modifier::Control]);

    fx.handle.send_string_clipboard("new", Some(paste)).unwrap();
    fx.sync();

    assert_eq!(
        fx.clipboard.writes(),
        vec![
            (ClipboardKind::Clipboard, "new".to_string()),
            (ClipboardKind::Clipboard, "old".to_string()),
        ]
    );
    assert_eq!(fx.clipboard.text(ClipboardKind::Clipboard).as_deref(), Some("old"));
    assert_eq!(fx.display.typed_keycodes(), vec![37, 55]);
}

#[test]
fn test_selection_paste_middle_clicks_at_the_pointer() {
    let display = MockDisplay::new();
    display.set_pointer(40, 30);
    let fx = start(display, MemoryClipboard::new(), Vec::new());

    fx.handle.send_string_clipboard("hi", None).unwrap();
    fx.sync();

    assert_eq!(fx.clipboard.text(ClipboardKind::Selection).as_deref(), Some("hi"));
    assert!(fx.display.events().contains(&SentEvent::FakeButton {
        kind: KeyEventKind::Press,
        button: 2,
        x: 40,
        y: 30
    }));
}

#[test]
fn test_missing_clipboard_fails_only_the_clipboard_send() {
    let display = MockDisplay::new();
    let recorder = Arc::new(Recorder::default());
    let mut engine = InputEngine::start(
        Box::new(display.clone()),
        Box::new(display.event_source()),
        recorder,
        Arc::new(StaticHotkeys::default()),
        MemoryClipboard::unavailable_factory(),
        fast_settings(),
    )
    .unwrap();
    let handle = engine.handle();

    handle.send_string_clipboard("x", None).unwrap();
    handle.send_string("a").unwrap();
    handle.window_title().unwrap();
    engine.cancel();

    assert_eq!(display.typed_keycodes(), vec![38]);
}

// ── Shutdown ──────────────────────────────────────────────────────────────────

#[test]
fn test_cancel_stops_capture_and_rejects_further_commands() {
    let mut fx = start(MockDisplay::new(), MemoryClipboard::new(), Vec::new());
    assert!(fx.capture.is_running());

    fx.engine.cancel();
    fx.engine.cancel();

    assert!(!fx.capture.is_running());
    assert!(matches!(fx.handle.send_string("a"), Err(EngineError::Stopped)));
    assert!(matches!(fx.handle.window_title(), Err(EngineError::Stopped)));
}
