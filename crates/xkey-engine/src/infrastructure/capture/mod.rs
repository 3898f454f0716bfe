//! Capture backends.
//!
//! | Backend                 | Platform | Source                              |
//! |-------------------------|----------|-------------------------------------|
//! | `RecordBackend`         | Linux    | X RECORD extension                  |
//! | `AccessibilityBackend`  | all      | AT-SPI registry events              |
//! | `MockCaptureBackend`    | all      | Events injected by tests            |
//!
//! [`attach_with_fallback`] starts the configured backend, falling back to
//! the other one when it cannot start.

use tracing::warn;

use crate::application::capture::CaptureBackend;
use crate::application::engine::InputEngine;
use crate::application::error::EngineError;
use crate::infrastructure::storage::config::BackendKind;

pub mod accessibility;
pub mod mock;

#[cfg(target_os = "linux")]
pub mod record;

/// Builds a backend of `kind`.  `display` is the X display name for the
/// record backend.
pub fn build_backend(kind: BackendKind, display: Option<&str>) -> Box<dyn CaptureBackend> {
    match kind {
        BackendKind::Accessibility => Box::new(accessibility::AccessibilityBackend::new(
            accessibility::AtspiRegistry::new(),
        )),
        #[cfg(target_os = "linux")]
        BackendKind::Record => Box::new(record::RecordBackend::new(display.map(str::to_string))),
        #[cfg(not(target_os = "linux"))]
        BackendKind::Record => {
            let _ = display;
            Box::new(accessibility::AccessibilityBackend::new(
                accessibility::AtspiRegistry::new(),
            ))
        }
    }
}

/// Attaches the `preferred` backend to `engine`; when it cannot start,
/// attaches the other one instead.  Returns the kind that is running.
///
/// # Errors
///
/// Returns the fallback's error when neither backend starts.
pub fn attach_with_fallback(
    engine: &mut InputEngine,
    preferred: BackendKind,
    display: Option<&str>,
) -> Result<BackendKind, EngineError> {
    match engine.attach_backend(build_backend(preferred, display)) {
        Ok(()) => Ok(preferred),
        Err(e) => {
            let fallback = preferred.other();
            warn!("{preferred} capture unavailable ({e}); falling back to {fallback}");
            engine.attach_backend(build_backend(fallback, display))?;
            Ok(fallback)
        }
    }
}
