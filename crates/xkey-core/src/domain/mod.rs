//! Domain entities for the xkey input engine.
//!
//! This module contains pure logic with no display-server dependencies.
//!
//! # What lives here? (for beginners)
//!
//! The engine talks to the X server through a connection that is owned by
//! the application layer.  Everything that can be decided *without* that
//! connection is modelled here, so it can be unit-tested on any machine:
//!
//! | Module           | Concept                                              |
//! |------------------|------------------------------------------------------|
//! | [`hotkey`]       | Hotkey items, window filters, window title/class     |
//! | [`grab`]         | Lock-state grab variants and the table of held grabs |
//! | [`remap`]        | Borrowing empty keycodes for untypeable characters   |
//! | [`keymap_guard`] | Debouncing keymap-change notifications               |

pub mod grab;
pub mod hotkey;
pub mod keymap_guard;
pub mod remap;

pub use grab::{lock_variants, Grab, GrabTable, WindowId};
pub use hotkey::{FilterError, HotkeyItem, WindowFilter, WindowInfo};
pub use keymap_guard::{GuardState, KeymapAction, KeymapGuard};
pub use remap::{KeycodeUpdate, RemapEntry, RemapPlan, RemapTable};
