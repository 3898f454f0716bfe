//! Logical key names used by hotkey definitions and send commands.
//!
//! Every key the engine can grab or synthesize is described by a [`Key`]:
//!
//! | Text form     | Variant                          |
//! |---------------|----------------------------------|
//! | `<shift>`     | `Key::Modifier(Modifier::Shift)` |
//! | `<enter>`     | `Key::Named(NamedKey::Enter)`    |
//! | `a`, `é`      | `Key::Char('a')`, `Key::Char('é')` |
//! | `<code108>`   | `Key::Code(108)`                 |
//!
//! # Why text names? (for beginners)
//!
//! Hotkey definitions come from a configuration file written by humans, and
//! the abbreviation engine that drives this core speaks the same vocabulary.
//! Angle-bracket names are unambiguous: a lone `<` is the character, while
//! `<enter>` is the Return key.  The text form round-trips through
//! [`std::fmt::Display`] and [`std::str::FromStr`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error returned when a key name cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyParseError {
    /// The input was empty.
    #[error("empty key name")]
    Empty,

    /// The name is bracketed but does not name a known key.
    #[error("unknown key name: {0}")]
    UnknownKeyName(String),

    /// The name is not a modifier (when a modifier was expected).
    #[error("not a modifier: {0}")]
    NotAModifier(String),
}

/// Logical modifier keys.
///
/// Each modifier resolves to a protocol bitmask through the
/// [`ModifierMaskTable`](super::modifier::ModifierMaskTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Shift,
    Control,
    Alt,
    AltGr,
    Super,
    Hyper,
    Meta,
    CapsLock,
    NumLock,
}

impl Modifier {
    /// All modifiers, in mask-table build order.
    pub const ALL: [Modifier; 9] = [
        Modifier::Shift,
        Modifier::Control,
        Modifier::Alt,
        Modifier::AltGr,
        Modifier::Super,
        Modifier::Hyper,
        Modifier::Meta,
        Modifier::CapsLock,
        Modifier::NumLock,
    ];

    /// Returns the bracketed text name (e.g. `"<ctrl>"`).
    pub fn name(self) -> &'static str {
        match self {
            Modifier::Shift => "<shift>",
            Modifier::Control => "<ctrl>",
            Modifier::Alt => "<alt>",
            Modifier::AltGr => "<alt_gr>",
            Modifier::Super => "<super>",
            Modifier::Hyper => "<hyper>",
            Modifier::Meta => "<meta>",
            Modifier::CapsLock => "<capslock>",
            Modifier::NumLock => "<numlock>",
        }
    }

    /// Returns `true` for the toggling lock modifiers.
    pub fn is_lock(self) -> bool {
        matches!(self, Modifier::CapsLock | Modifier::NumLock)
    }

    fn from_name(name: &str) -> Option<Self> {
        Modifier::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Modifier {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<Key>()? {
            Key::Modifier(m) => Ok(m),
            _ => Err(KeyParseError::NotAModifier(s.to_string())),
        }
    }
}

/// Non-printing keys that are not modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Space,
    Tab,
    Enter,
    Backspace,
    Escape,
    Left,
    Right,
    Up,
    Down,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    ScrollLock,
    PrintScreen,
    Pause,
    Menu,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    NpInsert,
    NpDelete,
    NpEnd,
    NpDown,
    NpPageDown,
    NpLeft,
    Np5,
    NpRight,
    NpHome,
    NpUp,
    NpPageUp,
    NpDivide,
    NpMultiply,
    NpAdd,
    NpSubtract,
}

/// Text names for every [`NamedKey`], used by both parse and display.
const NAMED_KEYS: &[(NamedKey, &str)] = &[
    (NamedKey::Space, "<space>"),
    (NamedKey::Tab, "<tab>"),
    (NamedKey::Enter, "<enter>"),
    (NamedKey::Backspace, "<backspace>"),
    (NamedKey::Escape, "<escape>"),
    (NamedKey::Left, "<left>"),
    (NamedKey::Right, "<right>"),
    (NamedKey::Up, "<up>"),
    (NamedKey::Down, "<down>"),
    (NamedKey::Insert, "<insert>"),
    (NamedKey::Delete, "<delete>"),
    (NamedKey::Home, "<home>"),
    (NamedKey::End, "<end>"),
    (NamedKey::PageUp, "<page_up>"),
    (NamedKey::PageDown, "<page_down>"),
    (NamedKey::ScrollLock, "<scroll_lock>"),
    (NamedKey::PrintScreen, "<print_screen>"),
    (NamedKey::Pause, "<pause>"),
    (NamedKey::Menu, "<menu>"),
    (NamedKey::F1, "<f1>"),
    (NamedKey::F2, "<f2>"),
    (NamedKey::F3, "<f3>"),
    (NamedKey::F4, "<f4>"),
    (NamedKey::F5, "<f5>"),
    (NamedKey::F6, "<f6>"),
    (NamedKey::F7, "<f7>"),
    (NamedKey::F8, "<f8>"),
    (NamedKey::F9, "<f9>"),
    (NamedKey::F10, "<f10>"),
    (NamedKey::F11, "<f11>"),
    (NamedKey::F12, "<f12>"),
    (NamedKey::NpInsert, "<np_insert>"),
    (NamedKey::NpDelete, "<np_delete>"),
    (NamedKey::NpEnd, "<np_end>"),
    (NamedKey::NpDown, "<np_down>"),
    (NamedKey::NpPageDown, "<np_page_down>"),
    (NamedKey::NpLeft, "<np_left>"),
    (NamedKey::Np5, "<np_5>"),
    (NamedKey::NpRight, "<np_right>"),
    (NamedKey::NpHome, "<np_home>"),
    (NamedKey::NpUp, "<np_up>"),
    (NamedKey::NpPageUp, "<np_page_up>"),
    (NamedKey::NpDivide, "<np_divide>"),
    (NamedKey::NpMultiply, "<np_multiply>"),
    (NamedKey::NpAdd, "<np_add>"),
    (NamedKey::NpSubtract, "<np_subtract>"),
];

impl NamedKey {
    /// Returns the bracketed text name (e.g. `"<page_up>"`).
    pub fn name(self) -> &'static str {
        NAMED_KEYS
            .iter()
            .find(|(k, _)| *k == self)
            .map(|(_, n)| *n)
            .unwrap_or("<unknown>")
    }

    fn from_name(name: &str) -> Option<Self> {
        NAMED_KEYS.iter().find(|(_, n)| *n == name).map(|(k, _)| *k)
    }
}

/// A key that can be grabbed, pressed, or sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A modifier key.
    Modifier(Modifier),
    /// A non-printing key.
    Named(NamedKey),
    /// A printable character.
    Char(char),
    /// A raw keycode, written `<codeNN>`.
    Code(u8),
}

impl Key {
    /// Returns the modifier this key represents, if any.
    pub fn as_modifier(&self) -> Option<Modifier> {
        match self {
            Key::Modifier(m) => Some(*m),
            _ => None,
        }
    }
}

impl From<Modifier> for Key {
    fn from(m: Modifier) -> Self {
        Key::Modifier(m)
    }
}

impl From<NamedKey> for Key {
    fn from(k: NamedKey) -> Self {
        Key::Named(k)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Modifier(m) => f.write_str(m.name()),
            Key::Named(k) => f.write_str(k.name()),
            Key::Char(c) => write!(f, "{c}"),
            Key::Code(code) => write!(f, "<code{code}>"),
        }
    }
}

impl FromStr for Key {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let first = chars.next().ok_or(KeyParseError::Empty)?;
        if chars.next().is_none() {
            return Ok(if first == ' ' {
                Key::Named(NamedKey::Space)
            } else {
                Key::Char(first)
            });
        }

        let lower = s.to_ascii_lowercase();
        if let Some(m) = Modifier::from_name(&lower) {
            return Ok(Key::Modifier(m));
        }
        if let Some(k) = NamedKey::from_name(&lower) {
            return Ok(Key::Named(k));
        }
        if let Some(code) = lower
            .strip_prefix("<code")
            .and_then(|rest| rest.strip_suffix('>'))
            .and_then(|digits| digits.parse::<u8>().ok())
        {
            return Ok(Key::Code(code));
        }
        Err(KeyParseError::UnknownKeyName(s.to_string()))
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Modifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Modifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A key together with the modifiers held while it is pressed, written
/// `<ctrl>+<shift>+v`.
///
/// Used for the paste command of a clipboard send.  A literal `+` key is
/// written as the last component (`<ctrl>++`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: BTreeSet<Modifier>,
    pub key: Key,
}

impl KeyCombo {
    pub fn new(key: Key, modifiers: impl IntoIterator<Item = Modifier>) -> Self {
        Self {
            modifiers: modifiers.into_iter().collect(),
            key,
        }
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modifiers {
            write!(f, "{m}+")?;
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for KeyCombo {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }
        let (head, last) = match s.strip_suffix("++") {
            Some(head) => (head, "+"),
            None if s == "+" => ("", "+"),
            None => match s.rsplit_once('+') {
                Some((head, last)) => (head, last),
                None => ("", s),
            },
        };

        let key = last.parse::<Key>()?;
        let modifiers = head
            .split('+')
            .filter(|part| !part.is_empty())
            .map(str::parse::<Modifier>)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { modifiers, key })
    }
}

impl Serialize for KeyCombo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyCombo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_character_parses_as_char() {
        assert_eq!("a".parse::<Key>(), Ok(Key::Char('a')));
        assert_eq!("é".parse::<Key>(), Ok(Key::Char('é')));
        assert_eq!("<".parse::<Key>(), Ok(Key::Char('<')));
    }

    #[test]
    fn test_space_character_parses_as_named_space() {
        assert_eq!(" ".parse::<Key>(), Ok(Key::Named(NamedKey::Space)));
    }

    #[test]
    fn test_modifier_names_parse_case_insensitively() {
        assert_eq!("<ctrl>".parse::<Key>(), Ok(Key::Modifier(Modifier::Control)));
        assert_eq!("<SHIFT>".parse::<Key>(), Ok(Key::Modifier(Modifier::Shift)));
        assert_eq!("<alt_gr>".parse::<Modifier>(), Ok(Modifier::AltGr));
    }

    #[test]
    fn test_raw_keycode_name_parses() {
        assert_eq!("<code108>".parse::<Key>(), Ok(Key::Code(108)));
    }

    #[test]
    fn test_unknown_bracketed_name_is_rejected() {
        // Arrange / Act
        let result = "<frobnicate>".parse::<Key>();

        // Assert
        assert_eq!(
            result,
            Err(KeyParseError::UnknownKeyName("<frobnicate>".to_string()))
        );
    }

    #[test]
    fn test_non_modifier_key_is_rejected_as_modifier() {
        assert_eq!(
            "<enter>".parse::<Modifier>(),
            Err(KeyParseError::NotAModifier("<enter>".to_string()))
        );
    }

    #[test]
    fn test_display_matches_parse_input_for_all_named_keys() {
        for &(key, name) in NAMED_KEYS {
            assert_eq!(Key::Named(key).to_string(), name);
            assert_eq!(name.parse::<Key>(), Ok(Key::Named(key)));
        }
        for m in Modifier::ALL {
            assert_eq!(m.to_string().parse::<Modifier>(), Ok(m));
        }
    }

    #[test]
    fn test_lock_modifiers_are_identified() {
        assert!(Modifier::CapsLock.is_lock());
        assert!(Modifier::NumLock.is_lock());
        assert!(!Modifier::Shift.is_lock());
    }

    #[test]
    fn test_key_combo_parses_modifiers_and_key() {
        // Arrange / Act
        let combo = "<ctrl>+<shift>+v".parse::<KeyCombo>().unwrap();

        // Assert
        assert_eq!(combo.key, Key::Char('v'));
        assert_eq!(
            combo.modifiers.into_iter().collect::<Vec<_>>(),
            vec![Modifier::Shift, Modifier::Control]
        );
    }

    #[test]
    fn test_key_combo_accepts_plus_as_the_key() {
        assert_eq!(
            "<ctrl>++".parse::<KeyCombo>(),
            Ok(KeyCombo::new(Key::Char('+'), [Modifier::Control]))
        );
        assert_eq!("+".parse::<KeyCombo>(), Ok(KeyCombo::new(Key::Char('+'), [])));
    }

    #[test]
    fn test_key_combo_rejects_non_modifier_prefix() {
        assert_eq!(
            "a+v".parse::<KeyCombo>(),
            Err(KeyParseError::NotAModifier("a".to_string()))
        );
    }

    #[test]
    fn test_key_combo_display_parses_back() {
        let combo = KeyCombo::new(Key::Named(NamedKey::Insert), [Modifier::Shift]);
        assert_eq!(combo.to_string(), "<shift>+<insert>");
        assert_eq!(combo.to_string().parse::<KeyCombo>(), Ok(combo));
    }
}
