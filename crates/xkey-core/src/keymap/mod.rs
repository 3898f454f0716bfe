//! Key names, X11 KeySym tables and keymap snapshots.
//!
//! The canonical representation of a key is [`Key`].  KeySyms and keycodes
//! only appear at the boundary with the display server, through
//! [`KeyboardMapping`] and [`ModifierMaskTable`].

pub mod key;
pub mod keysym;
pub mod mapping;
pub mod modifier;

pub use key::{Key, KeyCombo, KeyParseError, Modifier, NamedKey};
pub use mapping::{KeyboardMapping, ModifierMapping, ALTGR_KEYCODE};
pub use modifier::ModifierMaskTable;
