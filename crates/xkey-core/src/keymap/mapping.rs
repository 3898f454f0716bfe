//! Snapshots of the display server's keyboard and modifier mappings.
//!
//! # How an X11 keymap is laid out (for beginners)
//!
//! The server reports the keymap as one flat list of KeySyms.  Each keycode
//! between `min_keycode` and `max_keycode` owns `keysyms_per_keycode`
//! consecutive entries, one per *level*:
//!
//! ```text
//! keycode 38: [ a, A, a, A, æ, Æ, ... ]
//!               │  │        │  └─ level 5: AltGr + Shift
//!               │  │        └──── level 4: AltGr
//!               │  └───────────── level 1: Shift
//!               └──────────────── level 0: no modifier
//! ```
//!
//! A KeySym of `0` (`NoSymbol`) means the level is empty.  A keycode whose
//! levels are *all* empty is "available": the engine may borrow it to type a
//! character the layout cannot produce.

use super::key::Key;
use super::keysym::{self, XK_ISO_LEVEL3_SHIFT};

/// Keycode at which `ISO_Level3_Shift` must sit for AltGr levels to be used.
pub const ALTGR_KEYCODE: u8 = 108;

/// Levels used when AltGr is not usable: plain and Shift.
const OFFSETS_BASIC: &[usize] = &[0, 1];
/// Levels used when AltGr is usable: plain, Shift, AltGr, AltGr+Shift.
const OFFSETS_WITH_ALTGR: &[usize] = &[0, 1, 4, 5];

/// A copy of the server keymap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardMapping {
    min_keycode: u8,
    keysyms_per_keycode: u8,
    keysyms: Vec<u32>,
}

impl KeyboardMapping {
    /// Wraps a keymap as returned by `GetKeyboardMapping`.
    ///
    /// `keysyms` is truncated to a whole number of keycodes.
    pub fn new(min_keycode: u8, keysyms_per_keycode: u8, mut keysyms: Vec<u32>) -> Self {
        let per = usize::from(keysyms_per_keycode.max(1));
        keysyms.truncate(keysyms.len() / per * per);
        Self {
            min_keycode,
            keysyms_per_keycode: keysyms_per_keycode.max(1),
            keysyms,
        }
    }

    pub fn min_keycode(&self) -> u8 {
        self.min_keycode
    }

    /// Highest keycode covered by the snapshot.
    pub fn max_keycode(&self) -> u8 {
        let count = self.keysyms.len() / self.per();
        (usize::from(self.min_keycode) + count.saturating_sub(1)).min(usize::from(u8::MAX)) as u8
    }

    pub fn keysyms_per_keycode(&self) -> u8 {
        self.keysyms_per_keycode
    }

    /// Returns every level of `keycode`, or an empty slice when out of range.
    pub fn keysyms_of(&self, keycode: u8) -> &[u32] {
        match self.row_start(keycode) {
            Some(start) => &self.keysyms[start..start + self.per()],
            None => &[],
        }
    }

    /// Returns the KeySym at `level` of `keycode`, `0` when empty.
    pub fn keysym(&self, keycode: u8, level: usize) -> u32 {
        self.keysyms_of(keycode).get(level).copied().unwrap_or(0)
    }

    /// Returns every `(keycode, level)` producing `keysym`, ordered by level
    /// then keycode.
    pub fn keycodes_for(&self, keysym: u32) -> Vec<(u8, usize)> {
        if keysym == 0 {
            return Vec::new();
        }
        let mut found: Vec<(u8, usize)> = self
            .keycodes()
            .flat_map(|code| {
                self.keysyms_of(code)
                    .iter()
                    .enumerate()
                    .filter(move |&(_, &sym)| sym == keysym)
                    .map(move |(level, _)| (code, level))
            })
            .collect();
        found.sort_by_key(|&(code, level)| (level, code));
        found
    }

    /// Returns the first `(keycode, level)` for `keysym` whose level is in
    /// [`usable_offsets`](Self::usable_offsets).
    pub fn usable_keycode_for(&self, keysym: u32) -> Option<(u8, usize)> {
        let usable = self.usable_offsets();
        self.keycodes_for(keysym)
            .into_iter()
            .find(|(_, level)| usable.contains(level))
    }

    /// Returns the first usable `(keycode, level)` producing `c`, trying its
    /// Unicode KeySym and then its legacy KeySym.
    pub fn usable_keycode_for_char(&self, c: char) -> Option<(u8, usize)> {
        self.usable_keycode_for(keysym::char_to_keysym(c)).or_else(|| {
            keysym::legacy_keysym(c).and_then(|sym| self.usable_keycode_for(sym))
        })
    }

    /// Returns the first keycode carrying `c` at any level, in either
    /// encoding.
    pub fn any_keycode_for_char(&self, c: char) -> Option<u8> {
        self.any_keycode_for(keysym::char_to_keysym(c))
            .or_else(|| keysym::legacy_keysym(c).and_then(|sym| self.any_keycode_for(sym)))
    }

    /// Returns the first keycode carrying `keysym` at any level.
    pub fn any_keycode_for(&self, keysym: u32) -> Option<u8> {
        self.keycodes_for(keysym).first().map(|&(code, _)| code)
    }

    /// Returns `true` when `ISO_Level3_Shift` is at [`ALTGR_KEYCODE`], level 0.
    pub fn altgr_usable(&self) -> bool {
        self.keysym(ALTGR_KEYCODE, 0) == XK_ISO_LEVEL3_SHIFT
    }

    /// Levels that may be used to send characters.
    pub fn usable_offsets(&self) -> &'static [usize] {
        if self.altgr_usable() {
            OFFSETS_WITH_ALTGR
        } else {
            OFFSETS_BASIC
        }
    }

    /// Keycodes with no symbol at any level, in ascending order.
    pub fn available_keycodes(&self) -> Vec<u8> {
        self.keycodes()
            .filter(|&code| self.keysyms_of(code).iter().all(|&sym| sym == 0))
            .collect()
    }

    /// Replaces the levels of `keycode` in the snapshot.
    ///
    /// Missing levels are filled with `0`; extra levels are dropped.  Returns
    /// `false` when the keycode is out of range.
    pub fn set_keysyms(&mut self, keycode: u8, levels: &[u32]) -> bool {
        let Some(start) = self.row_start(keycode) else {
            return false;
        };
        let per = self.per();
        for (i, slot) in self.keysyms[start..start + per].iter_mut().enumerate() {
            *slot = levels.get(i).copied().unwrap_or(0);
        }
        true
    }

    /// Resolves a pressed keycode to the logical key it produces.
    ///
    /// Keypad keys yield digits while NumLock is on (unless Shift is also
    /// held); known function keys yield their [`Key`]; anything else yields
    /// the character at the shift/AltGr level, falling back to
    /// [`Key::Code`].
    pub fn lookup_key(&self, keycode: u8, shifted: bool, numlock: bool, altgr: bool) -> Key {
        let base = self.keysym(keycode, 0);
        if numlock && !shifted {
            if let Some(key) = keysym::keysym_to_numlocked(base) {
                return key;
            }
        }
        if let Some(key) = keysym::keysym_to_key(base) {
            return key;
        }
        let level = usize::from(shifted) + if altgr { 4 } else { 0 };
        keysym::keysym_to_char(self.keysym(keycode, level))
            .map(Key::Char)
            .unwrap_or(Key::Code(keycode))
    }

    fn per(&self) -> usize {
        usize::from(self.keysyms_per_keycode)
    }

    fn keycodes(&self) -> impl Iterator<Item = u8> + '_ {
        let count = self.keysyms.len() / self.per();
        (0..count).filter_map(move |i| u8::try_from(usize::from(self.min_keycode) + i).ok())
    }

    fn row_start(&self, keycode: u8) -> Option<usize> {
        let index = usize::from(keycode.checked_sub(self.min_keycode)?);
        let start = index * self.per();
        (start + self.per() <= self.keysyms.len()).then_some(start)
    }
}

/// Number of modifier rows in the X11 modifier map (Shift, Lock, Control, Mod1..Mod5).
pub const MODIFIER_ROWS: usize = 8;

/// A copy of the server modifier map (`GetModifierMapping`).
///
/// Row `i` lists the keycodes that set protocol mask bit `1 << i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierMapping {
    keycodes: Vec<u8>,
}

impl ModifierMapping {
    /// Wraps the flat keycode list; its length must be a multiple of eight.
    pub fn new(keycodes: Vec<u8>) -> Self {
        Self { keycodes }
    }

    /// Builds a mapping from explicit rows, padding with `0`.
    pub fn from_rows(rows: [&[u8]; MODIFIER_ROWS]) -> Self {
        let per = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut keycodes = Vec::with_capacity(per * MODIFIER_ROWS);
        for row in rows {
            keycodes.extend_from_slice(row);
            keycodes.extend(std::iter::repeat(0).take(per - row.len()));
        }
        Self { keycodes }
    }

    /// Returns the keycodes of row `index` (zeros are unused slots).
    pub fn row(&self, index: usize) -> &[u8] {
        let per = self.keycodes.len() / MODIFIER_ROWS;
        self.keycodes
            .get(index * per..(index + 1) * per)
            .unwrap_or(&[])
    }

    /// Returns the row containing `keycode`, if any.
    pub fn row_of(&self, keycode: u8) -> Option<usize> {
        if keycode == 0 {
            return None;
        }
        (0..MODIFIER_ROWS).find(|&i| self.row(i).contains(&keycode))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
