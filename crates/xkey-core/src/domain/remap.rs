//! Dynamic keycode remapping for characters the layout cannot type.
//!
//! # How remapping works (for beginners)
//!
//! Synthetic key events carry *keycodes*, and an application turns a keycode
//! into a character through the current keymap.  A character that no keycode
//! produces (say `é` on a US layout) therefore cannot be typed directly.
//!
//! Most keymaps have a few keycodes with no symbols at all.  A remap pass
//! borrows them: each one receives two of the missing characters, the first
//! at level 0 and the second at level 1 (Shift).  The mapping change is sent to
//! the server, the keys are typed, and the assignment stays in effect until
//! the next pass.
//!
//! ```text
//! text "naïve café"   missing: ï, é     available keycodes: [93, 97, ...]
//!
//!   keycode 93  ← [ ï, é ]      ï = (93, level 0)   é = (93, level 1)
//! ```

use std::collections::HashMap;

use crate::keymap::keysym::char_to_keysym;
use crate::keymap::KeyboardMapping;

/// Where a remapped character was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapEntry {
    pub character: char,
    pub keycode: u8,
    /// `0` for plain, `1` for Shift.
    pub offset: usize,
}

/// New level-0/level-1 KeySyms for one borrowed keycode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeycodeUpdate {
    pub keycode: u8,
    pub keysyms: [u32; 2],
}

/// The outcome of planning a remap pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapPlan {
    pub entries: Vec<RemapEntry>,
    pub updates: Vec<KeycodeUpdate>,
    /// Characters left over after every available keycode was used.
    pub unassigned: Vec<char>,
}

/// Characters currently reachable only through a remap pass.
///
/// Valid until the next pass or keymap re-initialization.
#[derive(Debug, Clone, Default)]
pub struct RemapTable {
    entries: HashMap<char, RemapEntry>,
}

impl RemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, c: char) -> Option<RemapEntry> {
        self.entries.get(&c).copied()
    }

    pub fn contains(&self, c: char) -> bool {
        self.entries.contains_key(&c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replaces the table with the entries of `plan`.
    pub fn apply(&mut self, plan: &RemapPlan) {
        self.entries = plan
            .entries
            .iter()
            .map(|entry| (entry.character, *entry))
            .collect();
    }
}

/// Returns `true` when `c` can be typed through the keymap at a usable level.
pub fn is_native(mapping: &KeyboardMapping, c: char) -> bool {
    mapping.usable_keycode_for_char(c).is_some()
}

/// Returns `true` when some character of `text` is neither native nor in
/// `table`.
pub fn needs_remap(mapping: &KeyboardMapping, table: &RemapTable, text: &str) -> bool {
    text.chars()
        .any(|c| !is_native(mapping, c) && !table.contains(c))
}

/// Returns the distinct non-native characters of `text`, in order of first
/// appearance.
pub fn unmappable_chars(mapping: &KeyboardMapping, text: &str) -> Vec<char> {
    let mut out: Vec<char> = Vec::new();
    for c in text.chars() {
        if !out.contains(&c) && !is_native(mapping, c) {
            out.push(c);
        }
    }
    out
}

/// Pairs `chars` onto `available` keycodes, two per keycode.
pub fn plan_remap(available: &[u8], chars: &[char]) -> RemapPlan {
    let mut plan = RemapPlan::default();
    let mut pending = chars.iter().copied();

    for &keycode in available {
        let Some(first) = pending.next() else {
            break;
        };
        let second = pending.next();

        plan.entries.push(RemapEntry {
            character: first,
            keycode,
            offset: 0,
        });
        if let Some(second) = second {
            plan.entries.push(RemapEntry {
                character: second,
                keycode,
                offset: 1,
            });
        }
        plan.updates.push(KeycodeUpdate {
            keycode,
            keysyms: [char_to_keysym(first), second.map_or(0, char_to_keysym)],
        });
    }

    plan.unassigned = pending.collect();
    plan
}

// ── Tests ─────────────────────────────────────────────────────────────────────
