//! Hotkey grabbing across the live window tree.
//!
//! # Where does a hotkey get grabbed? (for beginners)
//!
//! | Item kind             | Windows grabbed                                          |
//! |-----------------------|----------------------------------------------------------|
//! | global                | the root window                                          |
//! | global, needs Super   | the root, plus every window while the shell workaround is on |
//! | filtered              | every window whose own title/class matches the filter     |
//! | filtered, recursive   | matching windows and all of their descendants            |
//!
//! Some desktop shells (GNOME Shell, Cinnamon, Unity) swallow Super
//! combinations grabbed only on the root, so those grabs are repeated on
//! each window.  Each grab is issued once per lock-key variant (see
//! [`lock_variants`]).
//!
//! Every grab issued is recorded in a [`GrabTable`]; a keymap change
//! releases them all from the table, since keycodes and masks may change
//! meaning afterwards.  Failures on one window are logged and the walk goes
//! on.

use tracing::{debug, warn};
use xkey_core::domain::grab::lock_variants;
use xkey_core::{Grab, GrabTable, HotkeyItem, Modifier, WindowId};

use super::connection::ProtocolConnection;
use super::keyboard::KeyboardState;
use super::window_info::window_info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrabOp {
    Grab,
    Ungrab,
}

/// Keycode and mask variants of one resolved item.
struct GrabTarget {
    keycode: u8,
    masks: Vec<u16>,
    recursive: bool,
}

pub struct HotkeyGrabManager {
    grabs: GrabTable,
    workaround: bool,
}

impl HotkeyGrabManager {
    /// `workaround` enables per-window grabs for global Super items.
    pub fn new(workaround: bool) -> Self {
        Self {
            grabs: GrabTable::new(),
            workaround,
        }
    }

    pub fn grabs(&self) -> &GrabTable {
        &self.grabs
    }

    pub fn workaround_enabled(&self) -> bool {
        self.workaround
    }

    /// Grabs `item` wherever it applies.
    pub fn grab(
        &mut self,
        conn: &dyn ProtocolConnection,
        keyboard: &KeyboardState,
        item: &HotkeyItem,
    ) {
        self.apply(conn, keyboard, item, GrabOp::Grab);
    }

    /// Releases `item` from every window `grab` would have used.
    pub fn ungrab(
        &mut self,
        conn: &dyn ProtocolConnection,
        keyboard: &KeyboardState,
        item: &HotkeyItem,
    ) {
        self.apply(conn, keyboard, item, GrabOp::Ungrab);
    }

    /// Grabs every enabled item.
    pub fn grab_all(
        &mut self,
        conn: &dyn ProtocolConnection,
        keyboard: &KeyboardState,
        items: &[HotkeyItem],
    ) {
        for item in items.iter().filter(|item| item.enabled) {
            self.grab(conn, keyboard, item);
        }
    }

    /// Grabs the enabled items relevant to a newly created `window`.
    pub fn grab_for_window(
        &mut self,
        conn: &dyn ProtocolConnection,
        keyboard: &KeyboardState,
        items: &[HotkeyItem],
        window: WindowId,
    ) {
        let info = window_info(conn, window, true);
        for item in items.iter().filter(|item| item.enabled) {
            let wanted = if item.is_global() {
                self.needs_workaround(item)
            } else {
                !info.is_empty() && item.applies_to(&info)
            };
            if !wanted {
                continue;
            }
            if let Some(target) = resolve(keyboard, item) {
                self.issue(conn, window, &target, GrabOp::Grab);
            }
        }
    }

    /// Releases every recorded grab.
    pub fn ungrab_all(&mut self, conn: &dyn ProtocolConnection) {
        let grabs = self.grabs.take_all();
        debug!("releasing {} grabs", grabs.len());
        for grab in grabs {
            if let Err(e) = conn.ungrab_key(grab.window, grab.keycode, grab.mask) {
                debug!("ungrab on window {:#x} failed: {e}", grab.window);
            }
        }
    }

    /// Drops the grabs of a destroyed window from the table.
    pub fn forget_window(&mut self, window: WindowId) {
        self.grabs.forget_window(window);
    }

    fn needs_workaround(&self, item: &HotkeyItem) -> bool {
        self.workaround && item.requires(Modifier::Super)
    }

    fn apply(
        &mut self,
        conn: &dyn ProtocolConnection,
        keyboard: &KeyboardState,
        item: &HotkeyItem,
        op: GrabOp,
    ) {
        let Some(target) = resolve(keyboard, item) else {
            return;
        };
        let root = conn.root();

        if item.is_global() {
            self.issue(conn, root, &target, op);
            if self.needs_workaround(item) {
                self.walk(conn, root, &target, op, |_, _| true, true);
            }
        } else {
            self.walk(
                conn,
                root,
                &target,
                op,
                |conn, window| {
                    let info = window_info(conn, window, false);
                    !info.is_empty() && item.applies_to(&info)
                },
                false,
            );
        }
    }

    /// Visits every descendant of `start`, depth first.  A window is acted on
    /// when it is forced (`force_all`, or below a recursive match) or
    /// `matches` accepts it.
    fn walk<F>(
        &mut self,
        conn: &dyn ProtocolConnection,
        start: WindowId,
        target: &GrabTarget,
        op: GrabOp,
        matches: F,
        force_all: bool,
    ) where
        F: Fn(&dyn ProtocolConnection, WindowId) -> bool,
    {
        let mut stack: Vec<(WindowId, bool)> = children_of(conn, start)
            .into_iter()
            .rev()
            .map(|w| (w, force_all))
            .collect();

        while let Some((window, forced)) = stack.pop() {
            let matched = forced || matches(conn, window);
            if matched {
                self.issue(conn, window, target, op);
            }
            let force_children = forced || (matched && target.recursive);
            stack.extend(
                children_of(conn, window)
                    .into_iter()
                    .rev()
                    .map(|child| (child, force_children)),
            );
        }
    }

    fn issue(
        &mut self,
        conn: &dyn ProtocolConnection,
        window: WindowId,
        target: &GrabTarget,
        op: GrabOp,
    ) {
        for &mask in &target.masks {
            let grab = Grab {
                window,
                keycode: target.keycode,
                mask,
            };
            match op {
                GrabOp::Grab => {
                    if self.grabs.contains(&grab) {
                        continue;
                    }
                    match conn.grab_key(window, grab.keycode, mask) {
                        Ok(()) => {
                            debug!("grabbed keycode {} mask {mask:#x} on {window:#x}", grab.keycode);
                            self.grabs.insert(grab);
                        }
                        Err(e) => warn!(
                            "failed to grab keycode {} mask {mask:#x} on {window:#x}: {e}",
                            grab.keycode
                        ),
                    }
                }
                GrabOp::Ungrab => {
                    if let Err(e) = conn.ungrab_key(window, grab.keycode, mask) {
                        debug!("ungrab on window {window:#x} failed: {e}");
                    }
                    self.grabs.remove(&grab);
                }
            }
        }
    }
}

fn children_of(conn: &dyn ProtocolConnection, window: WindowId) -> Vec<WindowId> {
    conn.children(window).unwrap_or_else(|e| {
        debug!("cannot list children of {window:#x}: {e}");
        Vec::new()
    })
}

/// Resolves the keycode and lock-variant masks of `item`, or logs why it
/// cannot be grabbed.
fn resolve(keyboard: &KeyboardState, item: &HotkeyItem) -> Option<GrabTarget> {
    let Some(keycode) = keyboard.keycode_for(item.key) else {
        warn!("hotkey {item} not grabbable: no keycode for {}", item.key);
        return None;
    };
    let mask = match keyboard.mask_for(&item.modifiers) {
        Ok(mask) => mask,
        Err(e) => {
            warn!("hotkey {item} not grabbable: {e}");
            return None;
        }
    };
    let masks = keyboard.masks();
    Some(GrabTarget {
        keycode,
        masks: lock_variants(
            mask,
            masks.mask(Modifier::CapsLock),
            masks.mask(Modifier::NumLock),
        ),
        recursive: item.recursive,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
