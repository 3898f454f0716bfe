//! Keymap-change debounce state machine.
//!
//! The server announces every keymap change, including the ones the engine
//! makes itself during a remap pass.  The guard decides what a change
//! notification should trigger:
//!
//! ```text
//!              begin_remap()                 notification
//!   ┌──────┐ ──────────────► ┌─────────────────┐   (ignored)
//!   │ Idle │                 │ RemapInProgress │ ◄─────────┐
//!   └──────┘ ◄────────────── └─────────────────┘ ──────────┘
//!     │  ▲      finish_remap()
//!     │  │
//!     │  │ finish_reinit()
//!     │  │
//!     ▼  │
//!   ┌──────────────────┐  notification
//!   │ ReinitInProgress │ ◄──────────── (coalesced)
//!   └──────────────────┘
//! ```
//!
//! A remap pass also leaves one *pending echo*: the notification its own
//! mapping change will produce.  The next notification is absorbed against it
//! whatever the state, so the engine never re-initializes because of itself.

/// Phase of the keymap guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    RemapInProgress,
    ReinitInProgress,
}

/// What a keymap-change notification should trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeymapAction {
    /// Start a re-initialization cycle.
    Reinit,
    /// A cycle is already running; this notification is folded into it.
    Coalesced,
    /// The notification was caused by the engine's own remap.
    Ignored,
}

#[derive(Debug)]
pub struct KeymapGuard {
    state: GuardState,
    pending_echoes: u32,
    coalesced: u32,
}

impl Default for KeymapGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl KeymapGuard {
    pub fn new() -> Self {
        Self {
            state: GuardState::Idle,
            pending_echoes: 0,
            coalesced: 0,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Marks the start of a remap pass that will change the keymap once.
    pub fn begin_remap(&mut self) {
        if self.state == GuardState::Idle {
            self.state = GuardState::RemapInProgress;
        }
        self.pending_echoes += 1;
    }

    /// Marks the end of a remap pass.
    pub fn finish_remap(&mut self) {
        if self.state == GuardState::RemapInProgress {
            self.state = GuardState::Idle;
        }
    }

    /// Ends a remap pass whose mapping change never reached the server, so
    /// no echo will arrive for it.
    pub fn abort_remap(&mut self) {
        self.pending_echoes = self.pending_echoes.saturating_sub(1);
        self.finish_remap();
    }

    /// Classifies a keymap-change notification and advances the state.
    pub fn on_keymap_changed(&mut self) -> KeymapAction {
        if self.pending_echoes > 0 {
            self.pending_echoes -= 1;
            return KeymapAction::Ignored;
        }
        match self.state {
            GuardState::Idle => {
                self.state = GuardState::ReinitInProgress;
                KeymapAction::Reinit
            }
            GuardState::RemapInProgress => KeymapAction::Ignored,
            GuardState::ReinitInProgress => {
                self.coalesced += 1;
                KeymapAction::Coalesced
            }
        }
    }

    /// Marks the end of a re-initialization cycle.
    ///
    /// Returns how many notifications were coalesced into it.  Pending echoes
    /// are dropped since the fresh keymap already includes them.
    pub fn finish_reinit(&mut self) -> u32 {
        let coalesced = self.coalesced;
        if self.state == GuardState::ReinitInProgress {
            self.state = GuardState::Idle;
        }
        self.coalesced = 0;
        self.pending_echoes = 0;
        coalesced
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
