//! Grab bookkeeping and lock-state expansion.
//!
//! A passive key grab in X11 matches the modifier state *exactly*, so a grab
//! on `Ctrl+F5` does not fire while CapsLock or NumLock is on.  Every hotkey is
//! therefore grabbed once per lock combination:
//!
//! | Variant        | Mask                        |
//! |----------------|-----------------------------|
//! | plain          | `mask`                      |
//! | NumLock        | `mask \| num`               |
//! | CapsLock       | `mask \| caps`              |
//! | both           | `mask \| num \| caps`       |
//!
//! Variants whose lock has no mask in the current layout are skipped.

use std::collections::BTreeSet;

/// Opaque X11 window identifier.
pub type WindowId = u32;

/// Expands `mask` into its lock-state variants, without duplicates.
pub fn lock_variants(mask: u16, caps: Option<u16>, num: Option<u16>) -> Vec<u16> {
    let mut variants = vec![mask];
    let mut push = |m: u16| {
        if !variants.contains(&m) {
            variants.push(m);
        }
    };
    if let Some(num) = num {
        push(mask | num);
    }
    if let Some(caps) = caps {
        push(mask | caps);
    }
    if let (Some(caps), Some(num)) = (caps, num) {
        push(mask | caps | num);
    }
    variants
}

/// One passive grab issued to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Grab {
    pub window: WindowId,
    pub keycode: u8,
    pub mask: u16,
}

/// Every grab currently held, used to release them all on keymap change.
#[derive(Debug, Clone, Default)]
pub struct GrabTable {
    grabs: BTreeSet<Grab>,
}

impl GrabTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a grab; returns `false` if it was already held.
    pub fn insert(&mut self, grab: Grab) -> bool {
        self.grabs.insert(grab)
    }

    /// Forgets a grab; returns `false` if it was not held.
    pub fn remove(&mut self, grab: &Grab) -> bool {
        self.grabs.remove(grab)
    }

    pub fn contains(&self, grab: &Grab) -> bool {
        self.grabs.contains(grab)
    }

    /// Forgets every grab on `window` (the window was destroyed).
    pub fn forget_window(&mut self, window: WindowId) {
        self.grabs.retain(|g| g.window != window);
    }

    /// Grabs held on `window`.
    pub fn on_window(&self, window: WindowId) -> impl Iterator<Item = &Grab> {
        self.grabs.iter().filter(move |g| g.window == window)
    }

    /// Removes and returns every grab.
    pub fn take_all(&mut self) -> Vec<Grab> {
        std::mem::take(&mut self.grabs).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.grabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grabs.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_variants_cover_all_four_combinations() {
        assert_eq!(
            lock_variants(0x04, Some(0x02), Some(0x10)),
            vec![0x04, 0x14, 0x06, 0x16]
        );
    }

    #[test]
    fn test_lock_variants_skip_missing_lock_masks() {
        assert_eq!(lock_variants(0x04, None, Some(0x10)), vec![0x04, 0x14]);
        assert_eq!(lock_variants(0x04, None, None), vec![0x04]);
    }

    #[test]
    fn test_lock_variants_do_not_duplicate_when_mask_has_lock() {
        assert_eq!(lock_variants(0x02, Some(0x02), None), vec![0x02]);
    }

    #[test]
    fn test_grab_table_insert_is_idempotent() {
        // Arrange
        let mut table = GrabTable::new();
        let grab = Grab { window: 1, keycode: 71, mask: 4 };

        // Act
        let first = table.insert(grab);
        let second = table.insert(grab);

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_forget_window_drops_only_that_window() {
        // Arrange
        let mut table = GrabTable::new();
        table.insert(Grab { window: 1, keycode: 71, mask: 4 });
        table.insert(Grab { window: 2, keycode: 71, mask: 4 });

        // Act
        table.forget_window(1);

        // Assert
        assert_eq!(table.on_window(1).count(), 0);
        assert_eq!(table.on_window(2).count(), 1);
    }

    #[test]
    fn test_take_all_empties_the_table() {
        let mut table = GrabTable::new();
        table.insert(Grab { window: 1, keycode: 71, mask: 4 });
        assert_eq!(table.take_all().len(), 1);
        assert!(table.is_empty());
    }
}
