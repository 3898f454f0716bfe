//! In-memory X server for tests.
//!
//! # Why a mock display?
//!
//! The real connection needs a running X server, grabs keys away from the
//! desktop, and types into whatever window happens to be focused.  Tests
//! cannot observe any of that.
//!
//! `MockDisplay` implements [`ProtocolConnection`] over a small model of an
//! X server: a US keyboard layout, a modifier map, a window tree with titles
//! and classes, the focus, the pointer, the set of passive grabs and a log of
//! every synthetic event.  [`MockDisplay::event_source`] returns the matching
//! [`EventSource`], which sees window creation/destruction and keymap
//! changes made through the helpers below.
//!
//! # Usage in tests
//!
//! ```ignore
//! let display = MockDisplay::new();
//! let editor = display.add_window(display.root(), "notes - Editor", ("editor", "Editor"));
//! display.set_focus(editor);
//!
//! // ... run the engine against Box::new(display.clone()) ...
//!
//! assert!(display.has_grab(display.root(), 41, 0x4));
//! assert_eq!(display.typed_keycodes(), vec![43, 26, 46, 46, 32]);
//! ```
//!
//! `MockDisplay` is a cheap handle: clones share the same server.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use xkey_core::{Grab, KeyboardMapping, ModifierMapping, WindowId};

use crate::application::connection::{
    ConnectionError, DisplayEvent, EventSource, KeyEventKind, PointerPosition, ProtocolConnection,
    TextProperty,
};

/// Root window id of the mock screen.
pub const MOCK_ROOT: WindowId = 0x100;

const MIN_KEYCODE: u8 = 8;
const MAX_KEYCODE: u8 = 255;
const KEYSYMS_PER_KEYCODE: u8 = 2;

// ── US layout ─────────────────────────────────────────────────────────────────

/// Character keys: (keycode, plain, shifted).
const CHAR_KEYS: &[(u8, char, char)] = &[
    (10, '1', '!'),
    (11, '2', '@'),
    (12, '3', '#'),
    (13, '4', '$'),
    (14, '5', '%'),
    (15, '6', '^'),
    (16, '7', '&'),
    (17, '8', '*'),
    (18, '9', '('),
    (19, '0', ')'),
    (20, '-', '_'),
    (21, '=', '+'),
    (24, 'q', 'Q'),
    (25, 'w', 'W'),
    (26, 'e', 'E'),
    (27, 'r', 'R'),
    (28, 't', 'T'),
    (29, 'y', 'Y'),
    (30, 'u', 'U'),
    (31, 'i', 'I'),
    (32, 'o', 'O'),
    (33, 'p', 'P'),
    (34, '[', '{'),
    (35, ']', '}'),
    (38, 'a', 'A'),
    (39, 's', 'S'),
    (40, 'd', 'D'),
    (41, 'f', 'F'),
    (42, 'g', 'G'),
    (43, 'h', 'H'),
    (44, 'j', 'J'),
    (45, 'k', 'K'),
    (46, 'l', 'L'),
    (47, ';', ':'),
    (48, '\'', '"'),
    (49, '`', '~'),
    (51, '\\', '|'),
    (52, 'z', 'Z'),
    (53, 'x', 'X'),
    (54, 'c', 'C'),
    (55, 'v', 'V'),
    (56, 'b', 'B'),
    (57, 'n', 'N'),
    (58, 'm', 'M'),
    (59, ',', '<'),
    (60, '.', '>'),
    (61, '/', '?'),
    (65, ' ', ' '),
];

/// Function, modifier and keypad keys: (keycode, plain, shifted) KeySyms.
const SYMBOL_KEYS: &[(u8, u32, u32)] = &[
    (9, 0xFF1B, 0),       // Escape
    (22, 0xFF08, 0),      // BackSpace
    (23, 0xFF09, 0xFE20), // Tab, ISO_Left_Tab
    (36, 0xFF0D, 0),      // Return
    (37, 0xFFE3, 0),      // Control_L
    (50, 0xFFE1, 0),      // Shift_L
    (62, 0xFFE2, 0),      // Shift_R
    (63, 0xFFAA, 0xFFAA), // KP_Multiply
    (64, 0xFFE9, 0),      // Alt_L
    (66, 0xFFE5, 0),      // Caps_Lock
    (67, 0xFFBE, 0),      // F1
    (68, 0xFFBF, 0),
    (69, 0xFFC0, 0),
    (70, 0xFFC1, 0),
    (71, 0xFFC2, 0),
    (72, 0xFFC3, 0),
    (73, 0xFFC4, 0),
    (74, 0xFFC5, 0),
    (75, 0xFFC6, 0),
    (76, 0xFFC7, 0),      // F10
    (77, 0xFF7F, 0),      // Num_Lock
    (78, 0xFF14, 0),      // Scroll_Lock
    (79, 0xFF95, 0xFFB7), // KP_Home, KP_7
    (80, 0xFF97, 0xFFB8), // KP_Up, KP_8
    (81, 0xFF9A, 0xFFB9), // KP_Prior, KP_9
    (82, 0xFFAD, 0xFFAD), // KP_Subtract
    (83, 0xFF96, 0xFFB4), // KP_Left, KP_4
    (84, 0xFF9D, 0xFFB5), // KP_Begin, KP_5
    (85, 0xFF98, 0xFFB6), // KP_Right, KP_6
    (86, 0xFFAB, 0xFFAB), // KP_Add
    (87, 0xFF9C, 0xFFB1), // KP_End, KP_1
    (88, 0xFF99, 0xFFB2), // KP_Down, KP_2
    (89, 0xFF9B, 0xFFB3), // KP_Next, KP_3
    (90, 0xFF9E, 0xFFB0), // KP_Insert, KP_0
    (91, 0xFF9F, 0xFFAE), // KP_Delete, KP_Decimal
    (95, 0xFFC8, 0),      // F11
    (96, 0xFFC9, 0),      // F12
    (104, 0xFF8D, 0),     // KP_Enter
    (105, 0xFFE4, 0),     // Control_R
    (106, 0xFFAF, 0xFFAF), // KP_Divide
    (107, 0xFF61, 0),     // Print
    (108, 0xFFEA, 0),     // Alt_R
    (110, 0xFF50, 0),     // Home
    (111, 0xFF52, 0),     // Up
    (112, 0xFF55, 0),     // Prior
    (113, 0xFF51, 0),     // Left
    (114, 0xFF53, 0),     // Right
    (115, 0xFF57, 0),     // End
    (116, 0xFF54, 0),     // Down
    (117, 0xFF56, 0),     // Next
    (118, 0xFF63, 0),     // Insert
    (119, 0xFFFF, 0),     // Delete
    (127, 0xFF13, 0),     // Pause
    (133, 0xFFEB, 0),     // Super_L
    (135, 0xFF67, 0),     // Menu
];

/// Modifier rows: Shift, Lock, Control, Mod1 (Alt), Mod2 (NumLock), Mod3,
/// Mod4 (Super), Mod5.
const MODIFIER_ROWS: [&[u8]; 8] = [&[50, 62], &[66], &[37, 105], &[64, 108], &[77], &[], &[133], &[]];

fn us_keyboard() -> KeyboardMapping {
    let count = usize::from(MAX_KEYCODE - MIN_KEYCODE) + 1;
    let mut mapping = KeyboardMapping::new(
        MIN_KEYCODE,
        KEYSYMS_PER_KEYCODE,
        vec![0; count * usize::from(KEYSYMS_PER_KEYCODE)],
    );
    for &(code, plain, shifted) in CHAR_KEYS {
        mapping.set_keysyms(code, &[plain as u32, shifted as u32]);
    }
    for &(code, plain, shifted) in SYMBOL_KEYS {
        mapping.set_keysyms(code, &[plain, shifted]);
    }
    mapping
}

// ── Recorded output ───────────────────────────────────────────────────────────

/// A synthetic event issued by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentEvent {
    /// `SendEvent` of a key event to a window.
    Key {
        window: WindowId,
        kind: KeyEventKind,
        keycode: u8,
        state: u16,
    },
    /// XTEST key event.
    FakeKey { kind: KeyEventKind, keycode: u8 },
    /// XTEST button event.
    FakeButton {
        kind: KeyEventKind,
        button: u8,
        x: i16,
        y: i16,
    },
    /// Pointer warp to `(x, y)` relative to `window`.
    Warp { window: WindowId, x: i16, y: i16 },
}

// ── Server model ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MockWindow {
    parent: Option<WindowId>,
    children: Vec<WindowId>,
    title: Option<String>,
    class: Option<(String, String)>,
    origin: (i16, i16),
}

struct MockState {
    mapping: KeyboardMapping,
    modifiers: ModifierMapping,
    windows: BTreeMap<WindowId, MockWindow>,
    next_window: WindowId,
    focus: WindowId,
    pointer: (i16, i16),
    led_mask: u32,
    grabs: BTreeSet<Grab>,
    keyboard_grab: Option<WindowId>,
    sent: Vec<SentEvent>,
    pending: VecDeque<DisplayEvent>,
    mapping_changes: usize,
    flushes: usize,
    refuse_grabs_on: BTreeSet<WindowId>,
    refuse_mapping_change: bool,
}

impl MockState {
    fn window(&self, window: WindowId) -> Result<&MockWindow, ConnectionError> {
        self.windows
            .get(&window)
            .ok_or(ConnectionError::BadWindow(window))
    }

    fn origin(&self, window: WindowId) -> Result<(i16, i16), ConnectionError> {
        Ok(self.window(window)?.origin)
    }

    fn remove_subtree(&mut self, window: WindowId) -> Vec<WindowId> {
        let mut removed = Vec::new();
        let mut stack = vec![window];
        while let Some(w) = stack.pop() {
            if let Some(entry) = self.windows.remove(&w) {
                stack.extend(entry.children);
                removed.push(w);
            }
        }
        removed
    }
}

struct Shared {
    state: Mutex<MockState>,
    events_ready: Condvar,
}

/// A shared in-memory X server.
#[derive(Clone)]
pub struct MockDisplay {
    shared: Arc<Shared>,
}

impl Default for MockDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDisplay {
    /// A server with a US layout, an empty root window and the focus on the
    /// root.
    pub fn new() -> Self {
        let mut windows = BTreeMap::new();
        windows.insert(MOCK_ROOT, MockWindow::default());
        let state = MockState {
            mapping: us_keyboard(),
            modifiers: ModifierMapping::from_rows(MODIFIER_ROWS),
            windows,
            next_window: MOCK_ROOT + 1,
            focus: MOCK_ROOT,
            pointer: (0, 0),
            led_mask: 0,
            grabs: BTreeSet::new(),
            keyboard_grab: None,
            sent: Vec::new(),
            pending: VecDeque::new(),
            mapping_changes: 0,
            flushes: 0,
            refuse_grabs_on: BTreeSet::new(),
            refuse_mapping_change: false,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                events_ready: Condvar::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn push_event(&self, state: &mut MockState, event: DisplayEvent) {
        state.pending.push_back(event);
        self.shared.events_ready.notify_all();
    }

    // ── Window tree ──────────────────────────────────────────────────────────

    /// Adds a window under `parent` without a creation event (it existed
    /// before the engine started).  Empty title/class strings leave the
    /// property unset.
    pub fn add_window(&self, parent: WindowId, title: &str, class: (&str, &str)) -> WindowId {
        let mut state = self.state();
        let id = state.next_window;
        state.next_window += 1;
        let origin = state
            .windows
            .get(&parent)
            .map(|p| p.origin)
            .unwrap_or_default();
        state.windows.insert(
            id,
            MockWindow {
                parent: Some(parent),
                children: Vec::new(),
                title: (!title.is_empty()).then(|| title.to_string()),
                class: (!class.0.is_empty() || !class.1.is_empty())
                    .then(|| (class.0.to_string(), class.1.to_string())),
                origin,
            },
        );
        if let Some(p) = state.windows.get_mut(&parent) {
            p.children.push(id);
        }
        id
    }

    /// Adds a window under `parent` and reports its creation.
    pub fn create_window(&self, parent: WindowId, title: &str, class: (&str, &str)) -> WindowId {
        let id = self.add_window(parent, title, class);
        let mut state = self.state();
        self.push_event(&mut state, DisplayEvent::WindowCreated(id));
        id
    }

    /// Removes `window` and its descendants, reporting each destruction.
    pub fn destroy_window(&self, window: WindowId) {
        let mut state = self.state();
        let parent = state.windows.get(&window).and_then(|w| w.parent);
        if let Some(p) = parent.and_then(|p| state.windows.get_mut(&p)) {
            p.children.retain(|&c| c != window);
        }
        for removed in state.remove_subtree(window) {
            state.grabs.retain(|g| g.window != removed);
            self.push_event(&mut state, DisplayEvent::WindowDestroyed(removed));
        }
    }

    /// Moves `window` to `(x, y)` in root coordinates.
    pub fn set_origin(&self, window: WindowId, x: i16, y: i16) {
        if let Some(w) = self.state().windows.get_mut(&window) {
            w.origin = (x, y);
        }
    }

    pub fn set_title(&self, window: WindowId, title: &str) {
        if let Some(w) = self.state().windows.get_mut(&window) {
            w.title = Some(title.to_string());
        }
    }

    pub fn set_focus(&self, window: WindowId) {
        self.state().focus = window;
    }

    pub fn set_pointer(&self, x: i16, y: i16) {
        self.state().pointer = (x, y);
    }

    pub fn pointer(&self) -> (i16, i16) {
        self.state().pointer
    }

    pub fn set_led_mask(&self, mask: u32) {
        self.state().led_mask = mask;
    }

    // ── Keymap ───────────────────────────────────────────────────────────────

    /// Changes the levels of `keycode` as another client would (e.g. a
    /// layout switch), reporting a keymap change.
    pub fn remap_externally(&self, keycode: u8, keysyms: &[u32]) {
        let mut state = self.state();
        state.mapping.set_keysyms(keycode, keysyms);
        self.push_event(&mut state, DisplayEvent::KeymapChanged);
    }

    /// Level-0 and level-1 KeySyms currently on `keycode`.
    pub fn keysyms_of(&self, keycode: u8) -> Vec<u32> {
        self.state().mapping.keysyms_of(keycode).to_vec()
    }

    /// Number of `ChangeKeyboardMapping` requests the engine issued.
    pub fn mapping_change_count(&self) -> usize {
        self.state().mapping_changes
    }

    /// Makes the next `ChangeKeyboardMapping` fail.
    pub fn refuse_mapping_change(&self) {
        self.state().refuse_mapping_change = true;
    }

    // ── Grabs ────────────────────────────────────────────────────────────────

    /// Makes every grab on `window` fail, as for a window destroyed
    /// mid-walk.
    pub fn refuse_grabs_on(&self, window: WindowId) {
        self.state().refuse_grabs_on.insert(window);
    }

    pub fn grabs(&self) -> Vec<Grab> {
        self.state().grabs.iter().copied().collect()
    }

    pub fn has_grab(&self, window: WindowId, keycode: u8, mask: u16) -> bool {
        self.state().grabs.contains(&Grab {
            window,
            keycode,
            mask,
        })
    }

    /// Windows holding at least one grab.
    pub fn grabbed_windows(&self) -> BTreeSet<WindowId> {
        self.state().grabs.iter().map(|g| g.window).collect()
    }

    pub fn keyboard_grab(&self) -> Option<WindowId> {
        self.state().keyboard_grab
    }

    // ── Output ───────────────────────────────────────────────────────────────

    pub fn events(&self) -> Vec<SentEvent> {
        self.state().sent.clone()
    }

    pub fn clear_events(&self) {
        self.state().sent.clear();
    }

    /// Keycodes of the synthetic key presses (not releases) sent to windows,
    /// modifiers included.
    pub fn typed_keycodes(&self) -> Vec<u8> {
        self.state()
            .sent
            .iter()
            .filter_map(|e| match *e {
                SentEvent::Key {
                    kind: KeyEventKind::Press,
                    keycode,
                    ..
                } => Some(keycode),
                _ => None,
            })
            .collect()
    }

    pub fn flush_count(&self) -> usize {
        self.state().flushes
    }

    /// The event stream the listener thread reads.
    pub fn event_source(&self) -> MockEventSource {
        MockEventSource {
            display: self.clone(),
        }
    }
}

impl ProtocolConnection for MockDisplay {
    fn root(&self) -> WindowId {
        MOCK_ROOT
    }

    fn keyboard_mapping(&self) -> Result<KeyboardMapping, ConnectionError> {
        Ok(self.state().mapping.clone())
    }

    fn modifier_mapping(&self) -> Result<ModifierMapping, ConnectionError> {
        Ok(self.state().modifiers.clone())
    }

    fn change_keyboard_mapping(
        &self,
        first_keycode: u8,
        keysyms_per_keycode: u8,
        keysyms: &[u32],
    ) -> Result<(), ConnectionError> {
        let mut state = self.state();
        if std::mem::take(&mut state.refuse_mapping_change) {
            return Err(ConnectionError::Request("BadAlloc".to_string()));
        }
        let per = usize::from(keysyms_per_keycode.max(1));
        if keysyms.len() % per != 0 {
            return Err(ConnectionError::Request("BadLength".to_string()));
        }
        for (i, row) in keysyms.chunks(per).enumerate() {
            let code = u8::try_from(usize::from(first_keycode) + i)
                .map_err(|_| ConnectionError::Request("BadValue".to_string()))?;
            if !state.mapping.set_keysyms(code, row) {
                return Err(ConnectionError::Request("BadValue".to_string()));
            }
        }
        state.mapping_changes += 1;
        // The server notifies every client, the sender included.
        self.push_event(&mut state, DisplayEvent::KeymapChanged);
        Ok(())
    }

    fn led_mask(&self) -> Result<u32, ConnectionError> {
        Ok(self.state().led_mask)
    }

    fn input_focus(&self) -> Result<WindowId, ConnectionError> {
        Ok(self.state().focus)
    }

    fn children(&self, window: WindowId) -> Result<Vec<WindowId>, ConnectionError> {
        Ok(self.state().window(window)?.children.clone())
    }

    fn parent(&self, window: WindowId) -> Result<Option<WindowId>, ConnectionError> {
        Ok(self.state().window(window)?.parent)
    }

    fn text_property(
        &self,
        window: WindowId,
        property: TextProperty,
    ) -> Result<Option<String>, ConnectionError> {
        let state = self.state();
        let w = state.window(window)?;
        Ok(match property {
            TextProperty::Name => w.title.clone(),
            TextProperty::VisibleName | TextProperty::LegacyName => None,
        })
    }

    fn wm_class(&self, window: WindowId) -> Result<Option<(String, String)>, ConnectionError> {
        Ok(self.state().window(window)?.class.clone())
    }

    fn grab_key(&self, window: WindowId, keycode: u8, mask: u16) -> Result<(), ConnectionError> {
        let mut state = self.state();
        state.window(window)?;
        if state.refuse_grabs_on.contains(&window) {
            return Err(ConnectionError::BadWindow(window));
        }
        state.grabs.insert(Grab {
            window,
            keycode,
            mask,
        });
        Ok(())
    }

    fn ungrab_key(&self, window: WindowId, keycode: u8, mask: u16) -> Result<(), ConnectionError> {
        let mut state = self.state();
        state.window(window)?;
        state.grabs.remove(&Grab {
            window,
            keycode,
            mask,
        });
        Ok(())
    }

    fn grab_keyboard(&self, window: WindowId) -> Result<(), ConnectionError> {
        let mut state = self.state();
        state.window(window)?;
        state.keyboard_grab = Some(window);
        Ok(())
    }

    fn ungrab_keyboard(&self) -> Result<(), ConnectionError> {
        self.state().keyboard_grab = None;
        Ok(())
    }

    fn send_key_event(
        &self,
        window: WindowId,
        kind: KeyEventKind,
        keycode: u8,
        state: u16,
    ) -> Result<(), ConnectionError> {
        let mut s = self.state();
        s.window(window)?;
        s.sent.push(SentEvent::Key {
            window,
            kind,
            keycode,
            state,
        });
        Ok(())
    }

    fn fake_key(&self, kind: KeyEventKind, keycode: u8) -> Result<(), ConnectionError> {
        self.state().sent.push(SentEvent::FakeKey { kind, keycode });
        Ok(())
    }

    fn fake_button(
        &self,
        kind: KeyEventKind,
        button: u8,
        x: i16,
        y: i16,
    ) -> Result<(), ConnectionError> {
        self.state()
            .sent
            .push(SentEvent::FakeButton { kind, button, x, y });
        Ok(())
    }

    fn query_pointer(&self, window: WindowId) -> Result<PointerPosition, ConnectionError> {
        let state = self.state();
        let (ox, oy) = state.origin(window)?;
        let (x, y) = state.pointer;
        Ok(PointerPosition {
            root_x: x,
            root_y: y,
            win_x: x - ox,
            win_y: y - oy,
        })
    }

    fn translate_coordinates(
        &self,
        from: WindowId,
        to: WindowId,
        x: i16,
        y: i16,
    ) -> Result<(i16, i16), ConnectionError> {
        let state = self.state();
        let (fx, fy) = state.origin(from)?;
        let (tx, ty) = state.origin(to)?;
        Ok((x + fx - tx, y + fy - ty))
    }

    fn warp_pointer(&self, window: WindowId, x: i16, y: i16) -> Result<(), ConnectionError> {
        let mut state = self.state();
        let (ox, oy) = state.origin(window)?;
        state.pointer = (ox + x, oy + y);
        state.sent.push(SentEvent::Warp { window, x, y });
        Ok(())
    }

    fn flush(&self) -> Result<(), ConnectionError> {
        self.state().flushes += 1;
        Ok(())
    }
}

/// Event stream of a [`MockDisplay`].
pub struct MockEventSource {
    display: MockDisplay,
}

impl EventSource for MockEventSource {
    fn wait_events(&mut self, timeout: Duration) -> Result<Vec<DisplayEvent>, ConnectionError> {
        let shared = &self.display.shared;
        let state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut state, _) = shared
            .events_ready
            .wait_timeout_while(state, timeout, |s| s.pending.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        Ok(state.pending.drain(..).collect())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_us_layout_places_letters_on_evdev_keycodes() {
        // Arrange
        let display = MockDisplay::new();

        // Act
        let mapping = display.keyboard_mapping().unwrap();

        // Assert
        assert_eq!(mapping.usable_keycode_for('a' as u32), Some((38, 0)));
        assert_eq!(mapping.usable_keycode_for('A' as u32), Some((38, 1)));
        assert!(mapping.available_keycodes().contains(&8));
        assert!(!mapping.available_keycodes().contains(&38));
    }

    #[test]
    fn test_destroying_a_window_removes_its_subtree_and_grabs() {
        // Arrange
        let display = MockDisplay::new();
        let frame = display.add_window(MOCK_ROOT, "frame", ("", ""));
        let client = display.add_window(frame, "client", ("", ""));
        display.grab_key(client, 38, 0).unwrap();

        // Act
        display.destroy_window(frame);

        // Assert
        assert!(display.children(MOCK_ROOT).unwrap().is_empty());
        assert!(matches!(display.parent(client), Err(ConnectionError::BadWindow(_))));
        assert!(display.grabs().is_empty());
        let events = display.event_source().wait_events(Duration::ZERO).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_mapping_change_is_echoed_as_keymap_event() {
        // Arrange
        let display = MockDisplay::new();
        let mut source = display.event_source();

        // Act
        display
            .change_keyboard_mapping(8, 2, &[0xE9, 0xC9])
            .unwrap();

        // Assert
        assert_eq!(display.keysyms_of(8), vec![0xE9, 0xC9]);
        assert_eq!(
            source.wait_events(Duration::from_millis(10)).unwrap(),
            vec![DisplayEvent::KeymapChanged]
        );
    }

    #[test]
    fn test_translate_coordinates_uses_window_origins() {
        // Arrange
        let display = MockDisplay::new();
        let window = display.add_window(MOCK_ROOT, "w", ("", ""));
        display.set_origin(window, 100, 50);

        // Act
        let translated = display
            .translate_coordinates(MOCK_ROOT, window, 130, 70)
            .unwrap();

        // Assert
        assert_eq!(translated, (30, 20));
    }
}
