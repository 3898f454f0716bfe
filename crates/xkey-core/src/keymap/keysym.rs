//! Key to X11 KeySym translation tables.
//!
//! X11 KeySym values are defined in X11/keysymdef.h.
//! Reference: https://gitlab.freedesktop.org/xorg/proto/xorgproto/-/blob/master/include/X11/keysymdef.h
//!
//! # Characters and KeySyms (for beginners)
//!
//! X11 identifies the *symbol* a key produces with a 32-bit KeySym.  Printable
//! characters use one of two encodings:
//!
//! | Character range            | KeySym                      |
//! |----------------------------|-----------------------------|
//! | Latin-1 (U+0020–U+007E, U+00A0–U+00FF) | the code point itself |
//! | Everything else            | `0x0100_0000 + code point`  |
//!
//! So `'a'` is `0x0061`, `'é'` is `0x00E9` and `'€'` is `0x0100_20AC`.  Keys
//! that produce no character (Return, F5, Shift) live in the `0xFFxx` block.
//!
//! Many layouts still use the older per-script KeySyms for some characters
//! (`EuroSign` is `0x20AC`, `lstroke` is `0x01B3`).  [`legacy_keysym`] knows
//! the common ones, and lookups try both encodings.

use super::key::{Key, Modifier, NamedKey};

/// `XK_ISO_Level3_Shift`, the key that acts as AltGr on most layouts.
pub const XK_ISO_LEVEL3_SHIFT: u32 = 0xFE03;
/// `XK_Return`.
pub const XK_RETURN: u32 = 0xFF0D;
/// `XK_Tab`.
pub const XK_TAB: u32 = 0xFF09;

/// Offset added to a Unicode code point outside Latin-1 to form its KeySym.
const UNICODE_KEYSYM_BASE: u32 = 0x0100_0000;

/// KeySyms recognised as logical keys when decoding keycodes.
///
/// Both the left and right variants of each modifier are listed; the first
/// entry for a [`Key`] is the one used when sending it.
const KEYSYM_TO_KEY: &[(u32, Key)] = &[
    (0xFFE1, Key::Modifier(Modifier::Shift)),    // XK_Shift_L
    (0xFFE2, Key::Modifier(Modifier::Shift)),    // XK_Shift_R
    (0xFFE5, Key::Modifier(Modifier::CapsLock)), // XK_Caps_Lock
    (0xFFE3, Key::Modifier(Modifier::Control)),  // XK_Control_L
    (0xFFE4, Key::Modifier(Modifier::Control)),  // XK_Control_R
    (0xFFE9, Key::Modifier(Modifier::Alt)),      // XK_Alt_L
    (0xFFEA, Key::Modifier(Modifier::Alt)),      // XK_Alt_R
    (XK_ISO_LEVEL3_SHIFT, Key::Modifier(Modifier::AltGr)),
    (0xFFEB, Key::Modifier(Modifier::Super)),   // XK_Super_L
    (0xFFEC, Key::Modifier(Modifier::Super)),   // XK_Super_R
    (0xFFED, Key::Modifier(Modifier::Hyper)),   // XK_Hyper_L
    (0xFFEE, Key::Modifier(Modifier::Hyper)),   // XK_Hyper_R
    (0xFFE7, Key::Modifier(Modifier::Meta)),    // XK_Meta_L
    (0xFFE8, Key::Modifier(Modifier::Meta)),    // XK_Meta_R
    (0xFF7F, Key::Modifier(Modifier::NumLock)), // XK_Num_Lock
    (XK_TAB, Key::Named(NamedKey::Tab)),
    (0xFF51, Key::Named(NamedKey::Left)),
    (0xFF53, Key::Named(NamedKey::Right)),
    (0xFF52, Key::Named(NamedKey::Up)),
    (0xFF54, Key::Named(NamedKey::Down)),
    (XK_RETURN, Key::Named(NamedKey::Enter)),
    (0xFF08, Key::Named(NamedKey::Backspace)),
    (0xFF14, Key::Named(NamedKey::ScrollLock)),
    (0xFF61, Key::Named(NamedKey::PrintScreen)),
    (0xFF13, Key::Named(NamedKey::Pause)),
    (0xFF67, Key::Named(NamedKey::Menu)),
    (0xFFBE, Key::Named(NamedKey::F1)),
    (0xFFBF, Key::Named(NamedKey::F2)),
    (0xFFC0, Key::Named(NamedKey::F3)),
    (0xFFC1, Key::Named(NamedKey::F4)),
    (0xFFC2, Key::Named(NamedKey::F5)),
    (0xFFC3, Key::Named(NamedKey::F6)),
    (0xFFC4, Key::Named(NamedKey::F7)),
    (0xFFC5, Key::Named(NamedKey::F8)),
    (0xFFC6, Key::Named(NamedKey::F9)),
    (0xFFC7, Key::Named(NamedKey::F10)),
    (0xFFC8, Key::Named(NamedKey::F11)),
    (0xFFC9, Key::Named(NamedKey::F12)),
    (0xFF1B, Key::Named(NamedKey::Escape)),
    (0xFF63, Key::Named(NamedKey::Insert)),
    (0xFFFF, Key::Named(NamedKey::Delete)),
    (0xFF50, Key::Named(NamedKey::Home)),
    (0xFF57, Key::Named(NamedKey::End)),
    (0xFF55, Key::Named(NamedKey::PageUp)),
    (0xFF56, Key::Named(NamedKey::PageDown)),
    (0xFF9E, Key::Named(NamedKey::NpInsert)),   // XK_KP_Insert
    (0xFF9F, Key::Named(NamedKey::NpDelete)),   // XK_KP_Delete
    (0xFF9C, Key::Named(NamedKey::NpEnd)),      // XK_KP_End
    (0xFF99, Key::Named(NamedKey::NpDown)),     // XK_KP_Down
    (0xFF9B, Key::Named(NamedKey::NpPageDown)), // XK_KP_Page_Down
    (0xFF96, Key::Named(NamedKey::NpLeft)),     // XK_KP_Left
    (0xFF9D, Key::Named(NamedKey::Np5)),        // XK_KP_Begin
    (0xFF98, Key::Named(NamedKey::NpRight)),    // XK_KP_Right
    (0xFF95, Key::Named(NamedKey::NpHome)),     // XK_KP_Home
    (0xFF97, Key::Named(NamedKey::NpUp)),       // XK_KP_Up
    (0xFF9A, Key::Named(NamedKey::NpPageUp)),   // XK_KP_Page_Up
    (0xFFAF, Key::Named(NamedKey::NpDivide)),   // XK_KP_Divide
    (0xFFAA, Key::Named(NamedKey::NpMultiply)), // XK_KP_Multiply
    (0xFFAB, Key::Named(NamedKey::NpAdd)),      // XK_KP_Add
    (0xFFAD, Key::Named(NamedKey::NpSubtract)), // XK_KP_Subtract
    (0xFF8D, Key::Named(NamedKey::Enter)),      // XK_KP_Enter
    (0x0020, Key::Named(NamedKey::Space)),      // XK_space
];

/// Pre-Unicode KeySyms still found in common layouts.
const LEGACY_KEYSYMS: &[(char, u32)] = &[
    ('₠', 0x20A0), // EcuSign
    ('₡', 0x20A1), // ColonSign
    ('₢', 0x20A2), // CruzeiroSign
    ('₣', 0x20A3), // FFrancSign
    ('₤', 0x20A4), // LiraSign
    ('₥', 0x20A5), // MillSign
    ('₦', 0x20A6), // NairaSign
    ('₧', 0x20A7), // PesetaSign
    ('₨', 0x20A8), // RupeeSign
    ('₩', 0x20A9), // WonSign
    ('₪', 0x20AA), // NewSheqelSign
    ('₫', 0x20AB), // DongSign
    ('€', 0x20AC), // EuroSign
    ('Ą', 0x01A1), // Aogonek
    ('Ł', 0x01A3), // Lstroke
    ('Ś', 0x01A6), // Sacute
    ('Ź', 0x01AC), // Zacute
    ('Ż', 0x01AF), // Zabovedot
    ('ą', 0x01B1), // aogonek
    ('ł', 0x01B3), // lstroke
    ('ś', 0x01B6), // sacute
    ('ź', 0x01BC), // zacute
    ('ż', 0x01BF), // zabovedot
    ('Ć', 0x01C6), // Cacute
    ('Ę', 0x01CA), // Eogonek
    ('Ń', 0x01D1), // Nacute
    ('ć', 0x01E6), // cacute
    ('ę', 0x01EA), // eogonek
    ('ń', 0x01F1), // nacute
    ('Œ', 0x13BC), // OE
    ('œ', 0x13BD), // oe
];

/// What keypad keys produce while NumLock is on.
const KEYSYM_NUMLOCKED: &[(u32, Key)] = &[
    (0xFF9E, Key::Char('0')),
    (0xFF9F, Key::Char('.')),
    (0xFF9C, Key::Char('1')),
    (0xFF99, Key::Char('2')),
    (0xFF9B, Key::Char('3')),
    (0xFF96, Key::Char('4')),
    (0xFF9D, Key::Char('5')),
    (0xFF98, Key::Char('6')),
    (0xFF95, Key::Char('7')),
    (0xFF97, Key::Char('8')),
    (0xFF9A, Key::Char('9')),
    (0xFFAF, Key::Char('/')),
    (0xFFAA, Key::Char('*')),
    (0xFFAB, Key::Char('+')),
    (0xFFAD, Key::Char('-')),
    (0xFF8D, Key::Named(NamedKey::Enter)),
];

/// Translates a printable character to its X11 KeySym.
///
/// Newline and tab translate to `XK_Return` and `XK_Tab` so that multi-line
/// phrases can be typed directly.
pub fn char_to_keysym(c: char) -> u32 {
    let cp = c as u32;
    match c {
        '\n' | '\r' => XK_RETURN,
        '\t' => XK_TAB,
        _ if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) => cp,
        _ => UNICODE_KEYSYM_BASE | cp,
    }
}

/// The pre-Unicode KeySym of `c`, for the characters that have a common one.
pub fn legacy_keysym(c: char) -> Option<u32> {
    LEGACY_KEYSYMS
        .iter()
        .find(|(ch, _)| *ch == c)
        .map(|(_, sym)| *sym)
}

/// Translates a character KeySym back to the character it produces.
///
/// Returns `None` for function-key KeySyms and for legacy KeySyms outside
/// [`legacy_keysym`]'s table.
pub fn keysym_to_char(keysym: u32) -> Option<char> {
    match keysym {
        0x20..=0x7E | 0xA0..=0xFF => char::from_u32(keysym),
        0x0100_0100..=0x0110_FFFF => char::from_u32(keysym - UNICODE_KEYSYM_BASE),
        _ => LEGACY_KEYSYMS
            .iter()
            .find(|(_, sym)| *sym == keysym)
            .map(|(ch, _)| *ch),
    }
}

/// Translates a [`Key`] to the KeySym used to look up its keycode.
///
/// Returns `None` for [`Key::Code`], which already names a keycode.
pub fn key_to_keysym(key: Key) -> Option<u32> {
    match key {
        Key::Char(c) => Some(char_to_keysym(c)),
        Key::Code(_) => None,
        other => KEYSYM_TO_KEY
            .iter()
            .find(|(_, k)| *k == other)
            .map(|(sym, _)| *sym),
    }
}

/// Translates a KeySym to a logical [`Key`], if it names a known key.
pub fn keysym_to_key(keysym: u32) -> Option<Key> {
    KEYSYM_TO_KEY
        .iter()
        .find(|(sym, _)| *sym == keysym)
        .map(|(_, k)| *k)
}

/// Translates a keypad KeySym to what it produces with NumLock on.
pub fn keysym_to_numlocked(keysym: u32) -> Option<Key> {
    KEYSYM_NUMLOCKED
        .iter()
        .find(|(sym, _)| *sym == keysym)
        .map(|(_, k)| *k)
}

/// Returns every KeySym that acts as `modifier`.
pub fn modifier_keysyms(modifier: Modifier) -> impl Iterator<Item = u32> {
    KEYSYM_TO_KEY
        .iter()
        .filter(move |(_, k)| *k == Key::Modifier(modifier))
        .map(|(sym, _)| *sym)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
