//! Key synthesis and keycode remapping.
//!
//! Characters are typed by sending key press/release events straight to the
//! focused window.  A character at a shifted level is wrapped in presses of
//! the matching modifiers:
//!
//! | Offset | Level          | Modifiers held   |
//! |--------|----------------|------------------|
//! | 0      | plain          | none             |
//! | 1      | Shift          | Shift            |
//! | 4      | AltGr          | AltGr            |
//! | 5      | AltGr + Shift  | AltGr, Shift     |
//!
//! Characters the layout cannot produce are first given a keycode by
//! [`KeycodeRemapper::prepare`].
//!
//! Some applications merge or drop a keycode that arrives again too quickly.
//! For their windows ([`SlowRepeat`]) a [`RepeatPacer`] flushes and pauses
//! before a keycode sent within the last ten keys.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};
use xkey_core::domain::remap::{needs_remap, plan_remap, unmappable_chars};
use xkey_core::{Key, KeyboardMapping, KeymapGuard, Modifier, RemapTable, WindowFilter, WindowId};

use super::connection::{ConnectionError, KeyEventKind, ProtocolConnection};
use super::error::EngineError;
use super::keyboard::KeyboardState;
use super::window_info::window_info;

/// Keycodes remembered by a [`RepeatPacer`].
const PACER_HISTORY: usize = 10;

/// Default pause before a recently sent keycode.
pub const REPEAT_PAUSE: Duration = Duration::from_micros(12_500);

/// Modifiers held to reach a keymap level.
pub fn offset_modifiers(offset: usize) -> &'static [Modifier] {
    match offset {
        1 => &[Modifier::Shift],
        4 => &[Modifier::AltGr],
        5 => &[Modifier::AltGr, Modifier::Shift],
        _ => &[],
    }
}

/// Owns the characters → keycode table of the last remap pass.
#[derive(Debug, Default)]
pub struct KeycodeRemapper {
    table: RemapTable,
}

impl KeycodeRemapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &RemapTable {
        &self.table
    }

    /// Forgets every remapped character (the keymap was reloaded).
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Makes every character of `text` typeable, running a remap pass when
    /// needed.  Returns `true` when a pass changed the server keymap.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Connection`] when the server rejects the
    /// mapping change.  The table is cleared in that case.
    pub fn prepare(
        &mut self,
        conn: &dyn ProtocolConnection,
        keyboard: &mut KeyboardState,
        guard: &Mutex<KeymapGuard>,
        text: &str,
    ) -> Result<bool, EngineError> {
        if !needs_remap(keyboard.layout(), &self.table, text) {
            return Ok(false);
        }

        // Every non-native character of the text is planned again, so the
        // characters of an earlier pass keep a keycode.
        let chars = unmappable_chars(keyboard.layout(), text);
        let plan = plan_remap(keyboard.available(), &chars);
        debug!("remapping {chars:?} onto keycodes {:?}", keyboard.available());
        if !plan.unassigned.is_empty() {
            warn!("no spare keycodes left for {:?}", plan.unassigned);
        }
        let (Some(first), Some(last)) = (
            plan.updates.iter().map(|u| u.keycode).min(),
            plan.updates.iter().map(|u| u.keycode).max(),
        ) else {
            return Ok(false);
        };

        let mut mapping = keyboard.mapping().clone();
        for update in &plan.updates {
            mapping.set_keysyms(update.keycode, &update.keysyms);
        }
        let keysyms: Vec<u32> = (first..=last)
            .flat_map(|code| mapping.keysyms_of(code).to_vec())
            .collect();

        lock(guard).begin_remap();
        let result = conn
            .change_keyboard_mapping(first, mapping.keysyms_per_keycode(), &keysyms)
            .and_then(|()| conn.flush());

        match result {
            Ok(()) => {
                lock(guard).finish_remap();
                keyboard.commit(mapping);
                self.table.apply(&plan);
                Ok(true)
            }
            Err(e) => {
                lock(guard).abort_remap();
                self.table.clear();
                Err(e.into())
            }
        }
    }

    /// Finds the keycode and level producing `c`: the layout first, then
    /// the remap table.
    pub fn resolve(&self, layout: &KeyboardMapping, c: char) -> Option<(u8, usize)> {
        layout
            .usable_keycode_for_char(c)
            .or_else(|| self.table.get(c).map(|entry| (entry.keycode, entry.offset)))
    }
}

fn lock(guard: &Mutex<KeymapGuard>) -> std::sync::MutexGuard<'_, KeymapGuard> {
    guard.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Repeat pacing ─────────────────────────────────────────────────────────────

/// Which windows get paced typing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SlowRepeat {
    #[default]
    Off,
    Always,
    /// Windows whose title or class matches the filter.
    For(WindowFilter),
}

impl SlowRepeat {
    /// Decides for the focused window.  Errors give `false`.
    pub fn applies(&self, conn: &dyn ProtocolConnection) -> bool {
        match self {
            SlowRepeat::Off => false,
            SlowRepeat::Always => true,
            SlowRepeat::For(filter) => conn
                .input_focus()
                .map(|focus| filter.matches(&window_info(conn, focus, true)))
                .unwrap_or(false),
        }
    }
}

/// Remembers the last keycodes sent and slows down repeats.
#[derive(Debug)]
pub struct RepeatPacer {
    recent: VecDeque<u8>,
    pause: Duration,
}

impl Default for RepeatPacer {
    fn default() -> Self {
        Self::new(REPEAT_PAUSE)
    }
}

impl RepeatPacer {
    pub fn new(pause: Duration) -> Self {
        Self {
            recent: VecDeque::with_capacity(PACER_HISTORY + 1),
            pause,
        }
    }

    /// Flushes and sleeps when `keycode` is among the recent keycodes, then
    /// remembers it.  Returns `true` when it paused.
    pub fn before_key(
        &mut self,
        conn: &dyn ProtocolConnection,
        keycode: u8,
    ) -> Result<bool, ConnectionError> {
        let repeat = self.recent.contains(&keycode);
        if repeat {
            trace!("pausing before repeated keycode {keycode}");
            conn.flush()?;
            thread::sleep(self.pause);
        }
        self.recent.push_back(keycode);
        if self.recent.len() > PACER_HISTORY {
            self.recent.pop_front();
        }
        Ok(repeat)
    }

    /// Forgets the history (after an explicit flush).
    pub fn reset(&mut self) {
        self.recent.clear();
    }
}

// ── Synthesis ─────────────────────────────────────────────────────────────────

/// Sends a press and a release of `keycode` with modifier `state` to
/// `window`.
pub fn send_keycode(
    conn: &dyn ProtocolConnection,
    window: WindowId,
    keycode: u8,
    state: u16,
) -> Result<(), EngineError> {
    conn.send_key_event(window, KeyEventKind::Press, keycode, state)?;
    conn.send_key_event(window, KeyEventKind::Release, keycode, state)?;
    Ok(())
}

/// Sends a bare press (or release) of `key` to `window`.
pub fn send_key_half(
    conn: &dyn ProtocolConnection,
    keyboard: &KeyboardState,
    window: WindowId,
    key: Key,
    kind: KeyEventKind,
) -> Result<(), EngineError> {
    let keycode = keyboard.require_keycode(key)?;
    conn.send_key_event(window, kind, keycode, 0)?;
    Ok(())
}

/// Presses `modifiers`, sends `keycode` with their combined mask, then
/// releases them in reverse order.
pub fn send_with_modifiers(
    conn: &dyn ProtocolConnection,
    keyboard: &KeyboardState,
    window: WindowId,
    keycode: u8,
    modifiers: &[Modifier],
) -> Result<(), EngineError> {
    let mask = keyboard.mask_for(modifiers)?;
    for &m in modifiers {
        send_key_half(conn, keyboard, window, Key::Modifier(m), KeyEventKind::Press)?;
    }
    send_keycode(conn, window, keycode, mask)?;
    for &m in modifiers.iter().rev() {
        send_key_half(conn, keyboard, window, Key::Modifier(m), KeyEventKind::Release)?;
    }
    Ok(())
}

/// Types `text` into the focused window, pacing repeated keycodes through
/// `pacer` when one is given.
///
/// Characters that still have no keycode after the remap pass are logged and
/// skipped, as are characters whose send fails.
pub fn send_string(
    conn: &dyn ProtocolConnection,
    keyboard: &mut KeyboardState,
    remapper: &mut KeycodeRemapper,
    guard: &Mutex<KeymapGuard>,
    text: &str,
    mut pacer: Option<&mut RepeatPacer>,
) -> Result<(), EngineError> {
    debug!("sending string {text:?}");
    if let Err(e) = remapper.prepare(conn, keyboard, guard, text) {
        warn!("remap pass failed, sending what the layout can type: {e}");
    }

    let focus = conn.input_focus()?;
    for c in text.chars() {
        let Some((keycode, offset)) = remapper.resolve(keyboard.layout(), c) else {
            warn!("unable to send character {c:?}");
            continue;
        };
        if let Some(pacer) = pacer.as_deref_mut() {
            if let Err(e) = pacer.before_key(conn, keycode) {
                debug!("flush before repeated key failed: {e}");
            }
        }
        if let Err(e) = send_with_modifiers(conn, keyboard, focus, keycode, offset_modifiers(offset)) {
            warn!("error sending character {c:?}: {e}");
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::connection::mock::{MockDisplay, SentEvent, MOCK_ROOT};
    use std::sync::{Arc, RwLock};
    use xkey_core::GuardState;

    struct Fixture {
        display: MockDisplay,
        keyboard: KeyboardState,
        remapper: KeycodeRemapper,
        guard: Mutex<KeymapGuard>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::on(MockDisplay::new())
        }

        fn on(display: MockDisplay) -> Self {
            let published = Arc::new(RwLock::new(KeyboardMapping::new(8, 1, Vec::new())));
            let keyboard = KeyboardState::load(&display, published).unwrap();
            Self {
                display,
                keyboard,
                remapper: KeycodeRemapper::new(),
                guard: Mutex::new(KeymapGuard::new()),
            }
        }

        fn send(&mut self, text: &str) {
            send_string(
                &self.display,
                &mut self.keyboard,
                &mut self.remapper,
                &self.guard,
                text,
                None,
            )
            .unwrap();
        }

        fn send_paced(&mut self, text: &str, pacer: &mut RepeatPacer) {
            send_string(
                &self.display,
                &mut self.keyboard,
                &mut self.remapper,
                &self.guard,
                text,
                Some(pacer),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_offset_modifiers_cover_every_level() {
        assert!(offset_modifiers(0).is_empty());
        assert_eq!(offset_modifiers(1), &[Modifier::Shift]);
        assert_eq!(offset_modifiers(4), &[Modifier::AltGr]);
        assert_eq!(offset_modifiers(5), &[Modifier::AltGr, Modifier::Shift]);
    }

    #[test]
    fn test_native_string_is_typed_without_remapping() {
        // Arrange
        let mut fx = Fixture::new();

        // Act
        fx.send("hello");

        // Assert
        assert_eq!(fx.display.typed_keycodes(), vec![43, 26, 46, 46, 32]);
        assert_eq!(fx.display.events().len(), 10);
        assert_eq!(fx.display.mapping_change_count(), 0);
        assert!(fx.remapper.table().is_empty());
    }

    #[test]
    fn test_shifted_character_is_wrapped_in_shift() {
        // Arrange
        let mut fx = Fixture::new();

        // Act
        fx.send("H");

        // Assert
        assert_eq!(
            fx.display.events(),
            vec![
                SentEvent::Key { window: MOCK_ROOT, kind: KeyEventKind::Press, keycode: 50, state: 0 },
                SentEvent::Key { window: MOCK_ROOT, kind: KeyEventKind::Press, keycode: 43, state: 1 },
                SentEvent::Key { window: MOCK_ROOT, kind: KeyEventKind::Release, keycode: 43, state: 1 },
                SentEvent::Key { window: MOCK_ROOT, kind: KeyEventKind::Release, keycode: 50, state: 0 },
            ]
        );
    }

    #[test]
    fn test_events_go_to_the_focused_window() {
        // Arrange
        let mut fx = Fixture::new();
        let editor = fx.display.add_window(MOCK_ROOT, "Editor", ("", ""));
        fx.display.set_focus(editor);

        // Act
        fx.send("a");

        // Assert
        assert!(fx
            .display
            .events()
            .iter()
            .all(|e| matches!(e, SentEvent::Key { window, .. } if *window == editor)));
    }

    #[test]
    fn test_missing_character_is_remapped_once_onto_a_spare_keycode() {
        // Arrange
        let mut fx = Fixture::new();

        // Act
        fx.send("café");
        fx.send("é");

        // Assert
        assert_eq!(fx.display.mapping_change_count(), 1);
        assert_eq!(fx.display.keysyms_of(8)[0], 'é' as u32);
        assert_eq!(fx.display.typed_keycodes(), vec![54, 38, 41, 8, 8]);
        assert_eq!(fx.guard.lock().unwrap().state(), GuardState::Idle);
    }

    #[test]
    fn test_two_missing_characters_share_one_keycode() {
        // Arrange
        let mut fx = Fixture::new();

        // Act
        fx.send("éü");

        // Assert
        assert_eq!(fx.display.keysyms_of(8), vec!['é' as u32, 'ü' as u32]);
        assert_eq!(fx.display.typed_keycodes(), vec![8, 50, 8]);
    }

    #[test]
    fn test_later_pass_keeps_characters_of_an_earlier_pass() {
        // Arrange
        let mut fx = Fixture::new();
        fx.send("é");
        fx.display.clear_events();

        // Act
        fx.send("éü");

        // Assert
        assert_eq!(fx.display.mapping_change_count(), 2);
        assert_eq!(fx.display.keysyms_of(8), vec!['é' as u32, 'ü' as u32]);
        assert_eq!(fx.display.typed_keycodes(), vec![8, 50, 8]);
        assert_eq!(fx.remapper.table().len(), 2);
    }

    #[test]
    fn test_remapped_character_is_not_native_on_the_layout() {
        // Arrange
        let mut fx = Fixture::new();

        // Act
        fx.send("é");

        // Assert
        assert!(fx.keyboard.mapping().usable_keycode_for('é' as u32).is_some());
        assert!(fx.keyboard.layout().usable_keycode_for('é' as u32).is_none());
        assert_eq!(fx.remapper.resolve(fx.keyboard.layout(), 'é'), Some((8, 0)));
    }

    #[test]
    fn test_character_under_its_legacy_keysym_is_typed_natively() {
        // Arrange
        let display = MockDisplay::new();
        display.remap_externally(8, &[0x20AC]);
        let mut fx = Fixture::on(display);

        // Act
        fx.send("€");

        // Assert
        assert_eq!(fx.display.typed_keycodes(), vec![8]);
        assert_eq!(fx.display.mapping_change_count(), 0);
        assert!(fx.remapper.table().is_empty());
    }

    #[test]
    fn test_rejected_mapping_change_skips_only_the_missing_characters() {
        // Arrange
        let mut fx = Fixture::new();
        fx.display.refuse_mapping_change();

        // Act
        fx.send("aé");

        // Assert
        assert_eq!(fx.display.typed_keycodes(), vec![38]);
        assert!(fx.remapper.table().is_empty());
        assert_eq!(fx.guard.lock().unwrap().state(), GuardState::Idle);
    }

    #[test]
    fn test_pacer_flushes_before_a_recent_keycode() {
        // Arrange
        let mut fx = Fixture::new();
        let mut pacer = RepeatPacer::new(Duration::from_millis(1));

        // Act
        fx.send_paced("hello", &mut pacer);

        // Assert
        assert_eq!(fx.display.typed_keycodes(), vec![43, 26, 46, 46, 32]);
        assert_eq!(fx.display.flush_count(), 1);
    }

    #[test]
    fn test_pacer_remembers_only_the_last_ten_keycodes() {
        // Arrange
        let display = MockDisplay::new();
        let mut pacer = RepeatPacer::new(Duration::ZERO);
        for keycode in 10..21 {
            pacer.before_key(&display, keycode).unwrap();
        }

        // Act
        let oldest = pacer.before_key(&display, 10).unwrap();
        let recent = pacer.before_key(&display, 20).unwrap();

        // Assert
        assert!(!oldest);
        assert!(recent);
    }

    #[test]
    fn test_pacer_reset_forgets_history() {
        // Arrange
        let display = MockDisplay::new();
        let mut pacer = RepeatPacer::new(Duration::ZERO);
        pacer.before_key(&display, 38).unwrap();

        // Act
        pacer.reset();

        // Assert
        assert!(!pacer.before_key(&display, 38).unwrap());
        assert_eq!(display.flush_count(), 0);
    }

    #[test]
    fn test_slow_repeat_filter_matches_the_focused_window() {
        // Arrange
        let display = MockDisplay::new();
        let vm = display.add_window(MOCK_ROOT, "Ubuntu - Oracle VirtualBox", ("", ""));
        let editor = display.add_window(MOCK_ROOT, "Editor", ("", ""));
        let rule = SlowRepeat::For(WindowFilter::new(".*VirtualBox.*").unwrap());

        // Act
        display.set_focus(vm);
        let on_vm = rule.applies(&display);
        display.set_focus(editor);
        let on_editor = rule.applies(&display);

        // Assert
        assert!(on_vm);
        assert!(!on_editor);
        assert!(SlowRepeat::Always.applies(&display));
        assert!(!SlowRepeat::Off.applies(&display));
    }

    #[test]
    fn test_send_with_modifiers_reports_missing_mask() {
        // Arrange
        let fx = Fixture::new();

        // Act
        let result = send_with_modifiers(&fx.display, &fx.keyboard, MOCK_ROOT, 26, &[Modifier::AltGr]);

        // Assert
        assert!(matches!(result, Err(EngineError::NoModifierMask(Modifier::AltGr))));
        assert!(fx.display.events().is_empty());
    }
}
