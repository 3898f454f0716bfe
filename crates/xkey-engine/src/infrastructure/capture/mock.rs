//! Mock capture backend for unit testing.
//!
//! Lets tests inject key and button events as if they had been recorded
//! from hardware.  Clones share the same sink, so a test keeps one clone and
//! hands the other to the engine.

use std::sync::{Arc, Mutex, PoisonError};

use crate::application::capture::{CaptureBackend, CaptureError, CaptureSink};

#[derive(Clone, Default)]
pub struct MockCaptureBackend {
    sink: Arc<Mutex<Option<Arc<dyn CaptureSink>>>>,
}

impl MockCaptureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.current().is_some()
    }

    /// Injects a key press.  Panics if the backend is not running.
    pub fn press(&self, keycode: u8) {
        self.running().on_key_down(keycode);
    }

    /// Injects a key release.  Panics if the backend is not running.
    pub fn release(&self, keycode: u8) {
        self.running().on_key_up(keycode);
    }

    /// Injects a button press.  Panics if the backend is not running.
    pub fn click(&self, button: u8, position: Option<(i16, i16)>) {
        let (x, y) = position.map_or((None, None), |(x, y)| (Some(x), Some(y)));
        self.running().on_mouse_button(button, x, y);
    }

    fn current(&self) -> Option<Arc<dyn CaptureSink>> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn running(&self) -> Arc<dyn CaptureSink> {
        match self.current() {
            Some(sink) => sink,
            None => panic!("MockCaptureBackend used before start()"),
        }
    }
}

impl CaptureBackend for MockCaptureBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn start(&mut self, sink: Arc<dyn CaptureSink>) -> Result<(), CaptureError> {
        let mut slot = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        *slot = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
