//! Logical modifier to protocol bitmask resolution.
//!
//! X11 does not hard-wire which bit means "Alt" or "Super".  The server's
//! modifier map assigns keycodes to eight rows (Shift, Lock, Control,
//! Mod1..Mod5); a modifier's mask is `1 << row` of the row holding any keycode
//! that carries one of its KeySyms.  On a typical desktop:
//!
//! | Modifier   | KeySym              | Row  | Mask   |
//! |------------|---------------------|------|--------|
//! | Shift      | `Shift_L`           | 0    | `0x01` |
//! | CapsLock   | `Caps_Lock`         | 1    | `0x02` |
//! | Control    | `Control_L`         | 2    | `0x04` |
//! | Alt        | `Alt_L`             | 3    | `0x08` |
//! | NumLock    | `Num_Lock`          | 4    | `0x10` |
//! | AltGr      | `ISO_Level3_Shift`  | 7    | `0x80` |
//! | Super      | `Super_L`           | 6    | `0x40` |

use std::collections::BTreeMap;

use tracing::debug;

use super::key::Modifier;
use super::keysym;
use super::mapping::{KeyboardMapping, ModifierMapping};

/// Modifier → protocol bitmask, rebuilt whenever the keymap changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierMaskTable {
    masks: BTreeMap<Modifier, u16>,
}

impl ModifierMaskTable {
    /// Derives the table from the current keyboard and modifier maps.
    ///
    /// A modifier whose KeySyms are on no keycode, or whose keycodes are in no
    /// modifier row, is left out of the table.
    pub fn build(keyboard: &KeyboardMapping, modifiers: &ModifierMapping) -> Self {
        let mut masks = BTreeMap::new();
        for modifier in Modifier::ALL {
            let row = keysym::modifier_keysyms(modifier)
                .flat_map(|sym| keyboard.keycodes_for(sym))
                .find_map(|(code, _)| modifiers.row_of(code));
            match row {
                Some(row) => {
                    masks.insert(modifier, 1u16 << row);
                }
                None => debug!("no modifier mask for {modifier}"),
            }
        }
        Self { masks }
    }

    /// Builds a table from explicit entries.
    pub fn from_masks(entries: impl IntoIterator<Item = (Modifier, u16)>) -> Self {
        Self {
            masks: entries.into_iter().collect(),
        }
    }

    /// Returns the mask of `modifier`, if the layout has one.
    pub fn mask(&self, modifier: Modifier) -> Option<u16> {
        self.masks.get(&modifier).copied()
    }

    /// ORs the masks of `modifiers` together.
    ///
    /// Returns the first modifier without a mask as the error.
    pub fn combined<'a>(
        &self,
        modifiers: impl IntoIterator<Item = &'a Modifier>,
    ) -> Result<u16, Modifier> {
        modifiers
            .into_iter()
            .try_fold(0u16, |acc, &m| self.mask(m).map(|bit| acc | bit).ok_or(m))
    }

    /// Returns the modifiers whose bits are all set in `state`.
    pub fn active_in(&self, state: u16) -> Vec<Modifier> {
        self.masks
            .iter()
            .filter(|(_, &bit)| state & bit == bit)
            .map(|(&m, _)| m)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Keycodes 50 Shift_L, 66 Caps_Lock, 37 Control_L, 64 Alt_L, 77 Num_Lock,
    /// 133 Super_L; one level each starting at 37.
    fn keyboard() -> KeyboardMapping {
        let mut m = KeyboardMapping::new(37, 1, vec![0; 100]);
        m.set_keysyms(37, &[0xFFE3]);
        m.set_keysyms(50, &[0xFFE1]);
        m.set_keysyms(64, &[0xFFE9]);
        m.set_keysyms(66, &[0xFFE5]);
        m.set_keysyms(77, &[0xFF7F]);
        m.set_keysyms(133, &[0xFFEB]);
        m
    }

    fn modifier_map() -> ModifierMapping {
        ModifierMapping::from_rows([&[50], &[66], &[37], &[64], &[77], &[], &[133], &[]])
    }

    #[test]
    fn test_build_assigns_row_bits() {
        // Act
        let table = ModifierMaskTable::build(&keyboard(), &modifier_map());

        // Assert
        assert_eq!(table.mask(Modifier::Shift), Some(0x01));
        assert_eq!(table.mask(Modifier::CapsLock), Some(0x02));
        assert_eq!(table.mask(Modifier::Control), Some(0x04));
        assert_eq!(table.mask(Modifier::Alt), Some(0x08));
        assert_eq!(table.mask(Modifier::NumLock), Some(0x10));
        assert_eq!(table.mask(Modifier::Super), Some(0x40));
    }

    #[test]
    fn test_modifier_without_keycode_has_no_mask() {
        let table = ModifierMaskTable::build(&keyboard(), &modifier_map());
        assert_eq!(table.mask(Modifier::Hyper), None);
        assert_eq!(table.mask(Modifier::AltGr), None);
    }

    #[test]
    fn test_modifier_keycode_outside_every_row_has_no_mask() {
        // Arrange: Hyper_L on keycode 40 but not in the modifier map.
        let mut kb = keyboard();
        kb.set_keysyms(40, &[0xFFED]);

        // Act
        let table = ModifierMaskTable::build(&kb, &modifier_map());

        // Assert
        assert_eq!(table.mask(Modifier::Hyper), None);
    }

    #[test]
    fn test_combined_ors_masks() {
        let table = ModifierMaskTable::build(&keyboard(), &modifier_map());
        assert_eq!(
            table.combined(&[Modifier::Control, Modifier::Alt]),
            Ok(0x0C)
        );
        let none: [Modifier; 0] = [];
        assert_eq!(table.combined(&none), Ok(0));
    }

    #[test]
    fn test_combined_reports_first_missing_modifier() {
        let table = ModifierMaskTable::build(&keyboard(), &modifier_map());
        assert_eq!(
            table.combined(&[Modifier::Control, Modifier::Hyper]),
            Err(Modifier::Hyper)
        );
    }

    #[test]
    fn test_active_in_decodes_state_bits() {
        let table = ModifierMaskTable::from_masks([(Modifier::Shift, 0x01), (Modifier::Control, 0x04)]);
        assert_eq!(table.active_in(0x05), vec![Modifier::Shift, Modifier::Control]);
        assert!(table.active_in(0x02).is_empty());
    }
}
