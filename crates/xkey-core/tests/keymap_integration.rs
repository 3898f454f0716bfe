//! Integration tests for xkey-core.
//!
//! These tests drive the public API the way the engine does: parse hotkey
//! definitions, resolve their keycodes and masks against a keymap snapshot,
//! and plan a remap for text the layout cannot type.

use xkey_core::domain::grab::lock_variants;
use xkey_core::domain::remap::{needs_remap, plan_remap, unmappable_chars};
use xkey_core::keymap::keysym::{char_to_keysym, key_to_keysym};
use xkey_core::{
    HotkeyItem, Key, KeyboardMapping, Modifier, ModifierMapping, ModifierMaskTable, NamedKey,
    RemapTable, WindowInfo,
};

/// Keycodes 8..=255, four levels; US letters, F5 on 71, modifiers on the
/// usual PC keycodes, keycodes 240..=255 left empty.
fn us_layout() -> KeyboardMapping {
    let mut m = KeyboardMapping::new(8, 4, vec![0; 248 * 4]);
    for (i, c) in "qwertyuiop".chars().enumerate() {
        m.set_keysyms(24 + i as u8, &[c as u32, c.to_ascii_uppercase() as u32]);
    }
    for (i, c) in "asdfghjkl".chars().enumerate() {
        m.set_keysyms(38 + i as u8, &[c as u32, c.to_ascii_uppercase() as u32]);
    }
    for (i, c) in "zxcvbnm".chars().enumerate() {
        m.set_keysyms(52 + i as u8, &[c as u32, c.to_ascii_uppercase() as u32]);
    }
    m.set_keysyms(65, &[0x20]);
    m.set_keysyms(71, &[0xFFC2]);
    m.set_keysyms(50, &[0xFFE1]);
    m.set_keysyms(66, &[0xFFE5]);
    m.set_keysyms(37, &[0xFFE3]);
    m.set_keysyms(64, &[0xFFE9]);
    m.set_keysyms(77, &[0xFF7F]);
    m.set_keysyms(133, &[0xFFEB]);
    // Give every other keycode below 240 a placeholder so only the high
    // range is available.
    for code in 8..=239u8 {
        if m.keysyms_of(code).iter().all(|&s| s == 0) {
            m.set_keysyms(code, &[0x1000_0000 + u32::from(code)]);
        }
    }
    m
}

fn us_modifiers() -> ModifierMapping {
    ModifierMapping::from_rows([&[50], &[66], &[37], &[64], &[77], &[], &[133], &[]])
}

#[test]
fn test_hotkey_from_config_resolves_to_keycode_and_lock_variants() {
    // Arrange
    let item: HotkeyItem = toml::from_str(
        r#"
        key = "<f5>"
        modifiers = ["<ctrl>", "<alt>"]
        "#,
    )
    .unwrap();
    let mapping = us_layout();
    let masks = ModifierMaskTable::build(&mapping, &us_modifiers());

    // Act
    let keysym = key_to_keysym(item.key).unwrap();
    let keycode = mapping.any_keycode_for(keysym);
    let mask = masks.combined(&item.modifiers).unwrap();
    let variants = lock_variants(
        mask,
        masks.mask(Modifier::CapsLock),
        masks.mask(Modifier::NumLock),
    );

    // Assert
    assert_eq!(keycode, Some(71));
    assert_eq!(mask, 0x04 | 0x08);
    assert_eq!(variants, vec![0x0C, 0x1C, 0x0E, 0x1E]);
}

#[test]
fn test_available_keycodes_are_the_empty_high_range() {
    let mapping = us_layout();
    assert_eq!(mapping.available_keycodes(), (240..=255).collect::<Vec<u8>>());
}

#[test]
fn test_remap_flow_makes_text_typeable() {
    // Arrange
    let mut mapping = us_layout();
    let mut table = RemapTable::new();
    let text = "café über";
    assert!(needs_remap(&mapping, &table, text));

    // Act: plan, apply to the snapshot as the engine does after the server
    // accepts the mapping change.
    let chars = unmappable_chars(&mapping, text);
    let plan = plan_remap(&mapping.available_keycodes(), &chars);
    for update in &plan.updates {
        mapping.set_keysyms(update.keycode, &update.keysyms);
    }
    table.apply(&plan);

    // Assert
    assert_eq!(chars, vec!['é', 'ü']);
    assert_eq!(mapping.usable_keycode_for(char_to_keysym('é')), Some((240, 0)));
    assert_eq!(mapping.usable_keycode_for(char_to_keysym('ü')), Some((240, 1)));
    assert!(!needs_remap(&mapping, &table, text));
}

#[test]
fn test_filtered_item_applies_only_to_matching_windows() {
    // Arrange
    let item: HotkeyItem = toml::from_str(
        r#"
        key = "k"
        modifiers = ["<super>"]
        filter = ".*Firefox"
        recursive = true
        "#,
    )
    .unwrap();

    // Assert
    assert!(!item.is_global());
    assert!(item.recursive);
    assert!(item.applies_to(&WindowInfo::new("Mozilla Firefox", "")));
    assert!(!item.applies_to(&WindowInfo::new("Terminal", "xterm.XTerm")));
}

#[test]
fn test_lookup_key_reports_named_modifier_and_raw_code() {
    let mapping = us_layout();
    assert_eq!(
        mapping.lookup_key(50, false, false, false),
        Key::Modifier(Modifier::Shift)
    );
    assert_eq!(
        mapping.lookup_key(71, false, false, false),
        Key::Named(NamedKey::F5)
    );
    assert_eq!(mapping.lookup_key(240, false, false, false), Key::Code(240));
}
