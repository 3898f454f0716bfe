//! Structural event listener.
//!
//! A background thread polls the [`EventSource`] with a bounded timeout and
//! turns what it sees into commands for the worker:
//!
//! | Event                                  | Command(s) enqueued                 |
//! |----------------------------------------|-------------------------------------|
//! | window created (not destroyed in batch) | `GrabForWindow(w)`                 |
//! | window destroyed                       | `ForgetWindow(w)`                   |
//! | keymap changed, guard says `Reinit`    | sleep settle delay, `UngrabAll`, `Reinitialize` |
//! | keymap changed, otherwise              | nothing (ignored or coalesced)      |
//!
//! The listener never touches the connection's mutating side itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};
use xkey_core::{KeymapAction, KeymapGuard};

use super::connection::{DisplayEvent, EventSource};
use super::dispatcher::{Command, CommandQueue};
use super::error::EngineError;

/// Timing of the listener loop.
#[derive(Debug, Clone, Copy)]
pub struct ListenerTiming {
    /// Upper bound of one wait on the event source.
    pub poll_interval: Duration,
    /// Delay between a keymap change and the re-initialization it triggers,
    /// so that bursts of changes settle first.
    pub keymap_settle: Duration,
}

/// Spawns the listener thread.  It exits when `stop` is set or the queue
/// reports the worker has stopped.
///
/// # Errors
///
/// Returns [`EngineError::Spawn`] if the thread cannot be created.
pub fn spawn_listener(
    mut events: Box<dyn EventSource>,
    queue: CommandQueue,
    guard: Arc<Mutex<KeymapGuard>>,
    stop: Arc<AtomicBool>,
    timing: ListenerTiming,
) -> Result<JoinHandle<()>, EngineError> {
    thread::Builder::new()
        .name("xkey-listener".to_string())
        .spawn(move || {
            while !stop.load(Ordering::Acquire) {
                let batch = match events.wait_events(timing.poll_interval) {
                    Ok(batch) => batch,
                    Err(e) => {
                        warn!("event poll failed: {e}");
                        thread::sleep(timing.poll_interval);
                        continue;
                    }
                };
                if let Err(EngineError::Stopped) = handle_batch(&batch, &queue, &guard, &stop, timing) {
                    break;
                }
            }
            debug!("event listener exiting");
        })
        .map_err(EngineError::Spawn)
}

fn handle_batch(
    batch: &[DisplayEvent],
    queue: &CommandQueue,
    guard: &Mutex<KeymapGuard>,
    stop: &AtomicBool,
    timing: ListenerTiming,
) -> Result<(), EngineError> {
    let destroyed: Vec<_> = batch
        .iter()
        .filter_map(|e| match e {
            DisplayEvent::WindowDestroyed(w) => Some(*w),
            _ => None,
        })
        .collect();

    for event in batch {
        match *event {
            DisplayEvent::WindowCreated(window) if !destroyed.contains(&window) => {
                queue.enqueue(Command::GrabForWindow(window))?;
            }
            DisplayEvent::WindowCreated(_) => {}
            DisplayEvent::WindowDestroyed(window) => {
                queue.enqueue(Command::ForgetWindow(window))?;
            }
            DisplayEvent::KeymapChanged => {
                let action = guard
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .on_keymap_changed();
                match action {
                    KeymapAction::Reinit => {
                        info!("keymap changed; re-initializing");
                        thread::sleep(timing.keymap_settle);
                        if stop.load(Ordering::Acquire) {
                            return Ok(());
                        }
                        queue.enqueue(Command::UngrabAll)?;
                        queue.enqueue(Command::Reinitialize)?;
                    }
                    KeymapAction::Coalesced => debug!("keymap change coalesced into running re-init"),
                    KeymapAction::Ignored => debug!("ignored keymap change caused by remap"),
                }
            }
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
