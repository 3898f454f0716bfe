//! In-memory clipboard for tests.
//!
//! Clones share the same contents, so a test keeps one clone to inspect
//! what the engine wrote and hands the other to the engine through
//! [`MemoryClipboard::factory`].

use std::sync::{Arc, Mutex, PoisonError};

use crate::application::clipboard::{
    ClipboardAccess, ClipboardError, ClipboardFactory, ClipboardKind,
};

#[derive(Debug, Default)]
struct Contents {
    clipboard: Option<String>,
    selection: Option<String>,
    /// Every write, in order.
    writes: Vec<(ClipboardKind, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Contents>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard whose `CLIPBOARD` already holds `text`.
    pub fn with_text(text: &str) -> Self {
        let clipboard = Self::new();
        clipboard.lock().clipboard = Some(text.to_string());
        clipboard
    }

    /// A factory handing the engine a clone of this clipboard.
    pub fn factory(&self) -> ClipboardFactory {
        let clone = self.clone();
        Box::new(move || Ok(Box::new(clone) as Box<dyn ClipboardAccess>))
    }

    /// A factory that fails, as on a machine without a clipboard service.
    pub fn unavailable_factory() -> ClipboardFactory {
        Box::new(|| Err(ClipboardError::Unavailable("no clipboard".to_string())))
    }

    pub fn text(&self, kind: ClipboardKind) -> Option<String> {
        let contents = self.lock();
        match kind {
            ClipboardKind::Clipboard => contents.clipboard.clone(),
            ClipboardKind::Selection => contents.selection.clone(),
        }
    }

    pub fn writes(&self) -> Vec<(ClipboardKind, String)> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Contents> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClipboardAccess for MemoryClipboard {
    fn get_text(&mut self, kind: ClipboardKind) -> Result<Option<String>, ClipboardError> {
        Ok(self.text(kind))
    }

    fn set_text(&mut self, kind: ClipboardKind, text: &str) -> Result<(), ClipboardError> {
        let mut contents = self.lock();
        let slot = match kind {
            ClipboardKind::Clipboard => &mut contents.clipboard,
            ClipboardKind::Selection => &mut contents.selection,
        };
        *slot = Some(text.to_string());
        contents.writes.push((kind, text.to_string()));
        Ok(())
    }
}
