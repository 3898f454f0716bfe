//! Capture through the X RECORD extension.
//!
//! # How RECORD works (for beginners)
//!
//! RECORD lets a client receive a copy of the protocol traffic of other
//! clients.  We ask for the *device events* range (KeyPress, KeyRelease,
//! ButtonPress) of all clients, which is every physical key and button the
//! user presses, whichever window has focus.
//!
//! Two connections are needed: the *data* connection is blocked inside
//! `RecordEnableContext`, streaming replies, so stopping must be requested
//! from a second *control* connection.
//!
//! ```text
//! ctrl: CreateContext ──► data: EnableContext ──► replies … ──► EndOfData
//!                         (capture thread)
//! ctrl: DisableContext ────────────────────────────────┘
//! ctrl: FreeContext
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::record::{self, ConnectionExt as _, ExtRange, Range, Range16, Range8, CS};
use x11rb::protocol::xproto;
use x11rb::rust_connection::RustConnection;
use xkey_core::{decode_device_events, DeviceEvent};
use xkey_core::protocol::RecordCategory;

use crate::application::capture::{CaptureBackend, CaptureError, CaptureSink};

const EMPTY8: Range8 = Range8 { first: 0, last: 0 };

fn device_event_range() -> Range {
    Range {
        core_requests: EMPTY8,
        core_replies: EMPTY8,
        ext_requests: ExtRange {
            major: EMPTY8,
            minor: Range16 { first: 0, last: 0 },
        },
        ext_replies: ExtRange {
            major: EMPTY8,
            minor: Range16 { first: 0, last: 0 },
        },
        delivered_events: EMPTY8,
        device_events: Range8 {
            first: xproto::KEY_PRESS_EVENT,
            last: xproto::BUTTON_PRESS_EVENT,
        },
        errors: EMPTY8,
        client_started: false,
        client_died: false,
    }
}

fn start_error(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Start(e.to_string())
}

struct Running {
    ctrl: RustConnection,
    context: record::Context,
    thread: JoinHandle<()>,
}

/// RECORD-based capture backend.
pub struct RecordBackend {
    display: Option<String>,
    running: Option<Running>,
}

impl RecordBackend {
    /// `display` is the X display name, `None` for `$DISPLAY`.
    pub fn new(display: Option<String>) -> Self {
        Self {
            display,
            running: None,
        }
    }
}

impl CaptureBackend for RecordBackend {
    fn name(&self) -> &'static str {
        "record"
    }

    fn start(&mut self, sink: Arc<dyn CaptureSink>) -> Result<(), CaptureError> {
        if self.running.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        let display = self.display.as_deref();
        let (ctrl, _) = RustConnection::connect(display).map_err(start_error)?;
        if ctrl
            .extension_information(record::X11_EXTENSION_NAME)
            .map_err(start_error)?
            .is_none()
        {
            return Err(CaptureError::ExtensionMissing("RECORD"));
        }
        let (data, _) = RustConnection::connect(display).map_err(start_error)?;

        let context = ctrl.generate_id().map_err(start_error)?;
        ctrl.record_create_context(context, 0, &[CS::ALL_CLIENTS.into()], &[device_event_range()])
            .map_err(start_error)?
            .check()
            .map_err(start_error)?;

        let thread = thread::Builder::new()
            .name("xkey-record".to_string())
            .spawn(move || record_loop(&data, context, sink.as_ref()))
            .map_err(start_error)?;

        self.running = Some(Running {
            ctrl,
            context,
            thread,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let disabled = running
            .ctrl
            .record_disable_context(running.context)
            .map(|_| ())
            .and_then(|()| running.ctrl.flush());
        if let Err(e) = disabled {
            // Without the disable request the data thread never wakes up;
            // leave it detached.
            warn!("cannot disable RECORD context: {e}");
            return;
        }
        if running.thread.join().is_err() {
            warn!("RECORD thread panicked");
        }
        if let Err(e) = running
            .ctrl
            .record_free_context(running.context)
            .map(|_| ())
            .and_then(|()| running.ctrl.flush())
        {
            debug!("cannot free RECORD context: {e}");
        }
    }
}

impl Drop for RecordBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

fn record_loop(data: &RustConnection, context: record::Context, sink: &dyn CaptureSink) {
    let replies = match data.record_enable_context(context) {
        Ok(replies) => replies,
        Err(e) => {
            warn!("cannot enable RECORD context: {e}");
            return;
        }
    };
    for reply in replies {
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                warn!("RECORD stream ended with an error: {e}");
                return;
            }
        };
        if reply.client_swapped {
            trace!("skipping byte-swapped RECORD data");
            continue;
        }
        if RecordCategory::from_u8(reply.category) != Some(RecordCategory::FromServer) {
            continue;
        }
        for event in decode_device_events(&reply.data) {
            match event {
                DeviceEvent::KeyPress { keycode } => sink.on_key_down(keycode),
                DeviceEvent::KeyRelease { keycode } => sink.on_key_up(keycode),
                DeviceEvent::ButtonPress {
                    button,
                    root_x,
                    root_y,
                } => sink.on_mouse_button(button, Some(root_x), Some(root_y)),
            }
        }
    }
    debug!("RECORD stream finished");
}
