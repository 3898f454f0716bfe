//! Capture through the desktop accessibility registry (AT-SPI).
//!
//! The registry delivers two kinds of events to registered listeners:
//!
//! | Registry event         | Example                        | Forwarded as                          |
//! |------------------------|--------------------------------|---------------------------------------|
//! | keystroke              | `hw_code` 38, pressed          | `on_key_down(38)` / `on_key_up`       |
//! | mouse button           | `mouse:button:1p` at (40, 30)  | `on_mouse_button(1, Some(40), Some(30))` |
//!
//! Button releases (`…r`) are dropped.
//!
//! [`AccessibilityRegistry`] abstracts the registry connection;
//! [`AtspiRegistry`] is the AT-SPI registry of the desktop session.
//!
//! # AT-SPI over D-Bus (for beginners)
//!
//! AT-SPI runs on its own D-Bus bus, whose address the session bus hands out
//! (`org.a11y.Bus.GetAddress`).  On that bus:
//!
//! ```text
//! keystrokes: we serve  /org/xkey/KeystrokeListener  (DeviceEventListener)
//!             and call  DeviceEventController.RegisterKeystrokeListener
//!             registry ──► NotifyEvent((type, id, hw_code, …)) ──► listener
//!
//! mouse:      we call   Registry.RegisterEvent("mouse:button")
//!             registry ──► signal Event.Mouse.Button("1p", x, y, …) ──► signal thread
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use zbus::blocking::{connection, Connection, MessageIterator};
use zbus::message::Type as MessageType;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Type};
use zbus::MatchRule;

use crate::application::capture::{CaptureBackend, CaptureError, CaptureSink};

/// An event delivered by the accessibility registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessibilityEvent {
    Keystroke { hw_code: u8, pressed: bool },
    /// A mouse event with its registry type string, e.g. `mouse:button:1p`,
    /// and the root coordinates the registry reported.
    Mouse {
        kind: String,
        x: Option<i16>,
        y: Option<i16>,
    },
}

/// Callback a registry invokes for every event.
pub type AccessibilityListener = Box<dyn Fn(AccessibilityEvent) + Send + Sync>;

/// Connection to an accessibility registry.
pub trait AccessibilityRegistry: Send {
    /// Checks that the registry is reachable.
    fn ensure_available(&self) -> Result<(), CaptureError>;

    /// Registers `listener` for keystroke and mouse events.
    fn listen(&mut self, listener: AccessibilityListener) -> Result<(), CaptureError>;

    /// Deregisters the listener.
    fn stop(&mut self);
}

/// Parses the button number of a `mouse:button:<n>p` press event.
pub fn parse_button_press(kind: &str) -> Option<u8> {
    kind.strip_prefix("mouse:button:")?
        .strip_suffix('p')?
        .parse()
        .ok()
}

fn forward(event: AccessibilityEvent, sink: &dyn CaptureSink) {
    match event {
        AccessibilityEvent::Keystroke {
            hw_code,
            pressed: true,
        } => sink.on_key_down(hw_code),
        AccessibilityEvent::Keystroke {
            hw_code,
            pressed: false,
        } => sink.on_key_up(hw_code),
        AccessibilityEvent::Mouse { kind, x, y } => match parse_button_press(&kind) {
            Some(button) => sink.on_mouse_button(button, x, y),
            None => trace!("ignoring accessibility event {kind}"),
        },
    }
}

/// Capture backend over an [`AccessibilityRegistry`].
pub struct AccessibilityBackend<R: AccessibilityRegistry> {
    registry: R,
    running: bool,
}

impl<R: AccessibilityRegistry> AccessibilityBackend<R> {
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            running: false,
        }
    }
}

impl<R: AccessibilityRegistry> CaptureBackend for AccessibilityBackend<R> {
    fn name(&self) -> &'static str {
        "accessibility"
    }

    fn start(&mut self, sink: Arc<dyn CaptureSink>) -> Result<(), CaptureError> {
        if self.running {
            return Err(CaptureError::AlreadyRunning);
        }
        self.registry.ensure_available()?;
        self.registry
            .listen(Box::new(move |event| forward(event, sink.as_ref())))?;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        if std::mem::take(&mut self.running) {
            self.registry.stop();
        }
    }
}

// ── Wire records ──────────────────────────────────────────────────────────────

/// `KEY_PRESSED_EVENT` in the registry's event type enumeration.
const KEY_PRESSED_EVENT: u32 = 0;
/// `KEY_RELEASED_EVENT`.
const KEY_RELEASED_EVENT: u32 = 1;

/// The `(uinnisb)` device event passed to `NotifyEvent`.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct KeystrokeRecord {
    pub kind: u32,
    pub id: i32,
    pub hw_code: i16,
    pub modifiers: i16,
    pub timestamp: i32,
    pub text: String,
    pub is_text: bool,
}

/// Translates a keystroke record; unknown types and out-of-range hardware
/// codes give `None`.
pub fn keystroke_event(record: &KeystrokeRecord) -> Option<AccessibilityEvent> {
    let pressed = match record.kind {
        KEY_PRESSED_EVENT => true,
        KEY_RELEASED_EVENT => false,
        _ => return None,
    };
    let hw_code = u8::try_from(record.hw_code).ok()?;
    Some(AccessibilityEvent::Keystroke { hw_code, pressed })
}

/// Builds the event for an `Event.Mouse.Button` signal.  `minor` is the
/// signal's first argument (`"1p"`); the two details are root coordinates.
pub fn mouse_event(minor: &str, detail1: i32, detail2: i32) -> AccessibilityEvent {
    AccessibilityEvent::Mouse {
        kind: format!("mouse:button:{minor}"),
        x: i16::try_from(detail1).ok(),
        y: i16::try_from(detail2).ok(),
    }
}

// ── Session registry ──────────────────────────────────────────────────────────

const REGISTRY_NAME: &str = "org.a11y.atspi.Registry";
const REGISTRY_PATH: &str = "/org/a11y/atspi/registry";
const DEC_PATH: &str = "/org/a11y/atspi/registry/deviceeventcontroller";
const DEC_INTERFACE: &str = "org.a11y.atspi.DeviceEventController";
const MOUSE_INTERFACE: &str = "org.a11y.atspi.Event.Mouse";
const LISTENER_PATH: &str = "/org/xkey/KeystrokeListener";
const MOUSE_BUTTON_EVENT: &str = "mouse:button";
/// Highest modifier bit (`MODIFIER_NUMLOCK`) the registry reports.
const MODIFIER_NUMLOCK: u32 = 14;

type SharedListener = Arc<dyn Fn(AccessibilityEvent) + Send + Sync>;

/// The object the registry calls with every keystroke.
struct KeystrokeListener {
    listener: SharedListener,
    active: Arc<AtomicBool>,
}

#[zbus::interface(name = "org.a11y.atspi.DeviceEventListener")]
impl KeystrokeListener {
    /// Returns `false`: the event is observed, never consumed.
    fn notify_event(&self, event: KeystrokeRecord) -> bool {
        if self.active.load(Ordering::Acquire) {
            if let Some(event) = keystroke_event(&event) {
                (self.listener)(event);
            }
        }
        false
    }
}

fn unavailable(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::RegistryUnavailable(e.to_string())
}

fn start_error(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Start(e.to_string())
}

/// Asks the session bus for the address of the accessibility bus.
fn a11y_bus_address() -> Result<String, CaptureError> {
    let session = Connection::session().map_err(unavailable)?;
    let reply = session
        .call_method(
            Some("org.a11y.Bus"),
            "/org/a11y/bus",
            Some("org.a11y.Bus"),
            "GetAddress",
            &(),
        )
        .map_err(unavailable)?;
    reply.body().deserialize::<String>().map_err(unavailable)
}

/// Body shapes of `Event.Mouse.Button` across registry versions.
type MouseSignalBody = (String, i32, i32, OwnedValue, HashMap<String, OwnedValue>);
type LegacyMouseSignalBody = (String, i32, i32, OwnedValue, (String, OwnedObjectPath));

fn parse_mouse_signal(message: &zbus::Message) -> Option<AccessibilityEvent> {
    let body = message.body();
    if let Ok((minor, x, y, _, _)) = body.deserialize::<MouseSignalBody>() {
        return Some(mouse_event(&minor, x, y));
    }
    body.deserialize::<LegacyMouseSignalBody>()
        .ok()
        .map(|(minor, x, y, _, _)| mouse_event(&minor, x, y))
}

fn signal_loop(messages: MessageIterator, listener: SharedListener, active: Arc<AtomicBool>) {
    for message in messages {
        if !active.load(Ordering::Acquire) {
            break;
        }
        match message {
            Ok(message) => match parse_mouse_signal(&message) {
                Some(event) => listener(event),
                None => trace!("unrecognised mouse signal body"),
            },
            Err(e) => {
                warn!("accessibility signal stream failed: {e}");
                break;
            }
        }
    }
    debug!("accessibility signal thread finished");
}

struct Listening {
    conn: Connection,
    active: Arc<AtomicBool>,
    // Blocked until the next signal after stop; left detached.
    _signals: JoinHandle<()>,
}

/// The AT-SPI registry of the current desktop session.
#[derive(Default)]
pub struct AtspiRegistry {
    listening: Option<Listening>,
}

impl AtspiRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccessibilityRegistry for AtspiRegistry {
    fn ensure_available(&self) -> Result<(), CaptureError> {
        let address = a11y_bus_address()?;
        debug!("accessibility bus at {address}");
        Ok(())
    }

    fn listen(&mut self, listener: AccessibilityListener) -> Result<(), CaptureError> {
        let listener: SharedListener = Arc::from(listener);
        let active = Arc::new(AtomicBool::new(true));
        let address = a11y_bus_address()?;

        let conn = connection::Builder::address(address.as_str())
            .map_err(unavailable)?
            .serve_at(
                LISTENER_PATH,
                KeystrokeListener {
                    listener: Arc::clone(&listener),
                    active: Arc::clone(&active),
                },
            )
            .map_err(start_error)?
            .build()
            .map_err(unavailable)?;

        // One registration per modifier combination, so keystrokes arrive
        // whatever modifiers are held.
        let path = ObjectPath::try_from(LISTENER_PATH).map_err(start_error)?;
        let no_keys: Vec<(i32, i32, String, i32)> = Vec::new();
        let kinds = vec![KEY_PRESSED_EVENT, KEY_RELEASED_EVENT];
        // (synchronous, preemptive, global)
        let mode = (false, false, true);
        for mask in 0..=(1u32 << MODIFIER_NUMLOCK) {
            conn.call_method(
                Some(REGISTRY_NAME),
                DEC_PATH,
                Some(DEC_INTERFACE),
                "RegisterKeystrokeListener",
                &(&path, &no_keys, mask, &kinds, mode),
            )
            .map_err(start_error)?;
        }

        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .interface(MOUSE_INTERFACE)
            .map_err(start_error)?
            .member("Button")
            .map_err(start_error)?
            .build();
        let messages = MessageIterator::for_match_rule(rule, &conn, None).map_err(start_error)?;
        conn.call_method(
            Some(REGISTRY_NAME),
            REGISTRY_PATH,
            Some(REGISTRY_NAME),
            "RegisterEvent",
            &MOUSE_BUTTON_EVENT,
        )
        .map_err(start_error)?;

        let signals = {
            let active = Arc::clone(&active);
            thread::Builder::new()
                .name("xkey-atspi".to_string())
                .spawn(move || signal_loop(messages, listener, active))
                .map_err(start_error)?
        };

        debug!("listening for accessibility keystroke and mouse events");
        self.listening = Some(Listening {
            conn,
            active,
            _signals: signals,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(listening) = self.listening.take() else {
            return;
        };
        listening.active.store(false, Ordering::Release);
        if let Err(e) = listening.conn.call_method(
            Some(REGISTRY_NAME),
            REGISTRY_PATH,
            Some(REGISTRY_NAME),
            "DeregisterEvent",
            &MOUSE_BUTTON_EVENT,
        ) {
            debug!("cannot deregister mouse events: {e}");
        }
        // The registry drops the keystroke listeners of a closed connection.
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
