//! Worker-owned keymap state.
//!
//! [`KeyboardState`] holds the keymap snapshot, the modifier mask table and
//! the list of available keycodes.  It is loaded at startup and reloaded on
//! every re-initialization.  Two keymaps are kept: the *layout* as loaded,
//! and the live snapshot that also carries the keycodes borrowed by remap
//! passes.  Whether a character is native is always judged on the layout.  A copy of the snapshot is published behind an
//! `RwLock` so that `lookup_key` can be answered on any thread without going
//! through the queue.

use std::sync::{Arc, PoisonError, RwLock};

use xkey_core::keymap::keysym::key_to_keysym;
use xkey_core::{Key, KeyboardMapping, Modifier, ModifierMapping, ModifierMaskTable};

use super::connection::{ConnectionError, ProtocolConnection};
use super::error::EngineError;

/// Keymap snapshot shared with non-worker threads.
pub type SharedKeymap = Arc<RwLock<KeyboardMapping>>;

pub struct KeyboardState {
    layout: KeyboardMapping,
    mapping: KeyboardMapping,
    masks: ModifierMaskTable,
    available: Vec<u8>,
    published: SharedKeymap,
}

impl KeyboardState {
    /// Fetches the keyboard and modifier maps and publishes the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if either mapping cannot be fetched.
    pub fn load(
        conn: &dyn ProtocolConnection,
        published: SharedKeymap,
    ) -> Result<Self, ConnectionError> {
        let (mapping, modifiers) = fetch(conn)?;
        let state = Self::from_parts(mapping, &modifiers, published);
        state.publish();
        Ok(state)
    }

    /// Re-fetches both maps, rebuilding the mask table and the available
    /// keycode list.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if either mapping cannot be fetched; the
    /// previous state is kept.
    pub fn reload(&mut self, conn: &dyn ProtocolConnection) -> Result<(), ConnectionError> {
        let (mapping, modifiers) = fetch(conn)?;
        *self = Self::from_parts(mapping, &modifiers, Arc::clone(&self.published));
        self.publish();
        Ok(())
    }

    fn from_parts(
        mapping: KeyboardMapping,
        modifiers: &ModifierMapping,
        published: SharedKeymap,
    ) -> Self {
        let masks = ModifierMaskTable::build(&mapping, modifiers);
        let available = mapping.available_keycodes();
        Self {
            layout: mapping.clone(),
            mapping,
            masks,
            available,
            published,
        }
    }

    /// The live snapshot, including remapped keycodes.
    pub fn mapping(&self) -> &KeyboardMapping {
        &self.mapping
    }

    /// The keymap as of the last (re)load, without remapped keycodes.
    pub fn layout(&self) -> &KeyboardMapping {
        &self.layout
    }

    pub fn masks(&self) -> &ModifierMaskTable {
        &self.masks
    }

    /// Keycodes that were empty at the last (re)load.
    pub fn available(&self) -> &[u8] {
        &self.available
    }

    /// Installs a locally modified snapshot (after a remap pass the server
    /// accepted) and publishes it.  The layout is left untouched.
    pub fn commit(&mut self, mapping: KeyboardMapping) {
        self.mapping = mapping;
        self.publish();
    }

    /// Resolves `key` to a keycode: raw codes directly, everything else via
    /// the first keycode carrying its KeySym (either encoding for
    /// characters).
    pub fn keycode_for(&self, key: Key) -> Option<u8> {
        match key {
            Key::Code(code) => Some(code),
            Key::Char(c) => self.mapping.any_keycode_for_char(c),
            other => key_to_keysym(other).and_then(|sym| self.mapping.any_keycode_for(sym)),
        }
    }

    /// Like [`keycode_for`](Self::keycode_for), as an [`EngineError`].
    pub fn require_keycode(&self, key: Key) -> Result<u8, EngineError> {
        self.keycode_for(key).ok_or(EngineError::NoKeycode(key))
    }

    /// ORs the masks of `modifiers`.
    pub fn mask_for<'a>(
        &self,
        modifiers: impl IntoIterator<Item = &'a Modifier>,
    ) -> Result<u16, EngineError> {
        self.masks
            .combined(modifiers)
            .map_err(EngineError::NoModifierMask)
    }

    /// The modifier a keycode acts as, judged by its level-0 KeySym.
    pub fn modifier_of(&self, keycode: u8) -> Option<Modifier> {
        self.mapping
            .lookup_key(keycode, false, false, false)
            .as_modifier()
    }

    fn publish(&self) {
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = self.mapping.clone();
    }
}

fn fetch(
    conn: &dyn ProtocolConnection,
) -> Result<(KeyboardMapping, ModifierMapping), ConnectionError> {
    Ok((conn.keyboard_mapping()?, conn.modifier_mapping()?))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
