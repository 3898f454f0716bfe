//! X11 connection over `x11rb`.
//!
//! # Two handles, one socket (for beginners)
//!
//! [`connect`] opens a single `RustConnection` and returns two handles to
//! it:
//!
//! - [`X11Connection`] implements [`ProtocolConnection`] and moves into the
//!   dispatcher worker, which is the only thread issuing requests.
//! - [`X11EventSource`] implements [`EventSource`] and moves into the
//!   listener thread, which only reads events.
//!
//! `RustConnection` is `Sync`, so the two can share it through an `Arc`.
//! Replies go to the thread waiting for them; events are queued until the
//! listener polls.
//!
//! Synthetic key events are delivered with `SendEvent` straight to the focus
//! window (so they reach it even while the keyboard is grabbed), XTEST is
//! used for "physical" key and button injection.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::{ConnectionError as X11ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::properties::WmClass;
use x11rb::protocol::xproto::{
    self, Atom, AtomEnum, ChangeWindowAttributesAux, ConnectionExt as _, EventMask, GrabMode,
    GrabStatus, KeyButMask, KeyPressEvent, Mapping, ModMask, Window,
};
use x11rb::protocol::xtest::{self, ConnectionExt as _};
use x11rb::protocol::{ErrorKind, Event};
use x11rb::rust_connection::RustConnection;
use x11rb::{CURRENT_TIME, NONE};
use xkey_core::{KeyboardMapping, ModifierMapping, WindowId};

use crate::application::connection::{
    ConnectionError, DisplayEvent, EventSource, KeyEventKind, PointerPosition, ProtocolConnection,
    TextProperty,
};

/// `PointerRoot` as returned by `GetInputFocus`.
const POINTER_ROOT: Window = 1;

/// Longest property value read, in 32-bit units.
const PROPERTY_LENGTH: u32 = 1024;

/// Sleep between event polls while waiting.
const POLL_STEP: Duration = Duration::from_millis(20);

// ── Error conversion ──────────────────────────────────────────────────────────

impl From<X11ConnectionError> for ConnectionError {
    fn from(e: X11ConnectionError) -> Self {
        ConnectionError::Request(e.to_string())
    }
}

impl From<ReplyError> for ConnectionError {
    fn from(e: ReplyError) -> Self {
        ConnectionError::Request(e.to_string())
    }
}

impl From<ReplyOrIdError> for ConnectionError {
    fn from(e: ReplyOrIdError) -> Self {
        ConnectionError::Request(e.to_string())
    }
}

/// Maps an X `BadWindow` error to [`ConnectionError::BadWindow`].
fn on_window<T>(window: WindowId, result: Result<T, ReplyError>) -> Result<T, ConnectionError> {
    result.map_err(|e| match &e {
        ReplyError::X11Error(x) if x.error_kind == ErrorKind::Window => {
            ConnectionError::BadWindow(window)
        }
        _ => e.into(),
    })
}

// ── Connection ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Atoms {
    visible_name: Atom,
    name: Atom,
}

/// Request side of the X connection.
pub struct X11Connection {
    conn: Arc<RustConnection>,
    root: Window,
    atoms: Atoms,
}

/// Event side of the X connection.
pub struct X11EventSource {
    conn: Arc<RustConnection>,
}

/// Opens `display` (or `$DISPLAY`), checks for XTEST and subscribes to
/// window creation/destruction on the root window.
///
/// # Errors
///
/// - [`ConnectionError::Connect`] if the display cannot be opened.
/// - [`ConnectionError::MissingExtension`] if XTEST is not offered.
pub fn connect(display: Option<&str>) -> Result<(X11Connection, X11EventSource), ConnectionError> {
    let (conn, screen) =
        RustConnection::connect(display).map_err(|e| ConnectionError::Connect(e.to_string()))?;

    if conn.extension_information(xtest::X11_EXTENSION_NAME)?.is_none() {
        return Err(ConnectionError::MissingExtension { extension: "XTEST" });
    }

    let root = conn
        .setup()
        .roots
        .get(screen)
        .map(|s| s.root)
        .ok_or_else(|| ConnectionError::Connect(format!("no screen {screen}")))?;

    let atoms = Atoms {
        visible_name: intern(&conn, b"_NET_WM_VISIBLE_NAME")?,
        name: intern(&conn, b"_NET_WM_NAME")?,
    };

    let aux = ChangeWindowAttributesAux::new().event_mask(EventMask::SUBSTRUCTURE_NOTIFY);
    conn.change_window_attributes(root, &aux)?.check()?;
    conn.flush()?;
    debug!("connected to X display, root window {root:#x}");

    let conn = Arc::new(conn);
    Ok((
        X11Connection {
            conn: Arc::clone(&conn),
            root,
            atoms,
        },
        X11EventSource { conn },
    ))
}

fn intern(conn: &RustConnection, name: &[u8]) -> Result<Atom, ConnectionError> {
    Ok(conn.intern_atom(false, name)?.reply()?.atom)
}

/// Decodes a text property.  `STRING` is Latin-1, everything else is
/// treated as UTF-8.
fn decode_text(type_: Atom, value: &[u8]) -> String {
    if type_ == Atom::from(AtomEnum::STRING) {
        value.iter().map(|&b| char::from(b)).collect()
    } else {
        String::from_utf8_lossy(value).into_owned()
    }
}

impl X11Connection {
    fn key_event(kind: KeyEventKind) -> u8 {
        match kind {
            KeyEventKind::Press => xproto::KEY_PRESS_EVENT,
            KeyEventKind::Release => xproto::KEY_RELEASE_EVENT,
        }
    }
}

impl ProtocolConnection for X11Connection {
    fn root(&self) -> WindowId {
        self.root
    }

    fn keyboard_mapping(&self) -> Result<KeyboardMapping, ConnectionError> {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = self
            .conn
            .get_keyboard_mapping(min, max - min + 1)?
            .reply()?;
        Ok(KeyboardMapping::new(
            min,
            reply.keysyms_per_keycode,
            reply.keysyms,
        ))
    }

    fn modifier_mapping(&self) -> Result<ModifierMapping, ConnectionError> {
        let reply = self.conn.get_modifier_mapping()?.reply()?;
        Ok(ModifierMapping::new(reply.keycodes))
    }

    fn change_keyboard_mapping(
        &self,
        first_keycode: u8,
        keysyms_per_keycode: u8,
        keysyms: &[u32],
    ) -> Result<(), ConnectionError> {
        let per = usize::from(keysyms_per_keycode.max(1));
        let count = u8::try_from(keysyms.len() / per)
            .map_err(|_| ConnectionError::Request("too many keycodes in one change".to_string()))?;
        self.conn
            .change_keyboard_mapping(count, first_keycode, keysyms_per_keycode, keysyms)?
            .check()?;
        Ok(())
    }

    fn led_mask(&self) -> Result<u32, ConnectionError> {
        Ok(self.conn.get_keyboard_control()?.reply()?.led_mask)
    }

    fn input_focus(&self) -> Result<WindowId, ConnectionError> {
        let focus = self.conn.get_input_focus()?.reply()?.focus;
        Ok(if focus == NONE || focus == POINTER_ROOT {
            self.root
        } else {
            focus
        })
    }

    fn children(&self, window: WindowId) -> Result<Vec<WindowId>, ConnectionError> {
        let tree = on_window(window, self.conn.query_tree(window)?.reply())?;
        Ok(tree.children)
    }

    fn parent(&self, window: WindowId) -> Result<Option<WindowId>, ConnectionError> {
        let tree = on_window(window, self.conn.query_tree(window)?.reply())?;
        Ok((tree.parent != NONE).then_some(tree.parent))
    }

    fn text_property(
        &self,
        window: WindowId,
        property: TextProperty,
    ) -> Result<Option<String>, ConnectionError> {
        let atom = match property {
            TextProperty::VisibleName => self.atoms.visible_name,
            TextProperty::Name => self.atoms.name,
            TextProperty::LegacyName => AtomEnum::WM_NAME.into(),
        };
        let reply = on_window(
            window,
            self.conn
                .get_property(false, window, atom, AtomEnum::ANY, 0, PROPERTY_LENGTH)?
                .reply(),
        )?;
        if reply.value.is_empty() {
            return Ok(None);
        }
        Ok(Some(decode_text(reply.type_, &reply.value)))
    }

    fn wm_class(&self, window: WindowId) -> Result<Option<(String, String)>, ConnectionError> {
        let class = on_window(window, WmClass::get(self.conn.as_ref(), window)?.reply())?;
        Ok(class.map(|c| {
            (
                String::from_utf8_lossy(c.instance()).into_owned(),
                String::from_utf8_lossy(c.class()).into_owned(),
            )
        }))
    }

    fn grab_key(&self, window: WindowId, keycode: u8, mask: u16) -> Result<(), ConnectionError> {
        let cookie = self.conn.grab_key(
            true,
            window,
            ModMask::from(mask),
            keycode,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
        )?;
        on_window(window, cookie.check())
    }

    fn ungrab_key(&self, window: WindowId, keycode: u8, mask: u16) -> Result<(), ConnectionError> {
        let cookie = self
            .conn
            .ungrab_key(keycode, window, ModMask::from(mask))?;
        on_window(window, cookie.check())
    }

    fn grab_keyboard(&self, window: WindowId) -> Result<(), ConnectionError> {
        let reply = on_window(
            window,
            self.conn
                .grab_keyboard(true, window, CURRENT_TIME, GrabMode::ASYNC, GrabMode::ASYNC)?
                .reply(),
        )?;
        if reply.status != GrabStatus::SUCCESS {
            return Err(ConnectionError::Request(format!(
                "keyboard grab refused: {:?}",
                reply.status
            )));
        }
        Ok(())
    }

    fn ungrab_keyboard(&self) -> Result<(), ConnectionError> {
        self.conn.ungrab_keyboard(CURRENT_TIME)?;
        Ok(())
    }

    fn send_key_event(
        &self,
        window: WindowId,
        kind: KeyEventKind,
        keycode: u8,
        state: u16,
    ) -> Result<(), ConnectionError> {
        let event = KeyPressEvent {
            response_type: Self::key_event(kind),
            detail: keycode,
            sequence: 0,
            time: CURRENT_TIME,
            root: self.root,
            event: window,
            child: NONE,
            root_x: 1,
            root_y: 1,
            event_x: 1,
            event_y: 1,
            state: KeyButMask::from(state),
            same_screen: true,
        };
        self.conn
            .send_event(false, window, EventMask::NO_EVENT, event)?;
        Ok(())
    }

    fn fake_key(&self, kind: KeyEventKind, keycode: u8) -> Result<(), ConnectionError> {
        self.conn
            .xtest_fake_input(Self::key_event(kind), keycode, CURRENT_TIME, self.root, 0, 0, 0)?;
        Ok(())
    }

    fn fake_button(
        &self,
        kind: KeyEventKind,
        button: u8,
        x: i16,
        y: i16,
    ) -> Result<(), ConnectionError> {
        let type_ = match kind {
            KeyEventKind::Press => xproto::BUTTON_PRESS_EVENT,
            KeyEventKind::Release => xproto::BUTTON_RELEASE_EVENT,
        };
        self.conn
            .xtest_fake_input(type_, button, CURRENT_TIME, self.root, x, y, 0)?;
        Ok(())
    }

    fn query_pointer(&self, window: WindowId) -> Result<PointerPosition, ConnectionError> {
        let reply = on_window(window, self.conn.query_pointer(window)?.reply())?;
        Ok(PointerPosition {
            root_x: reply.root_x,
            root_y: reply.root_y,
            win_x: reply.win_x,
            win_y: reply.win_y,
        })
    }

    fn translate_coordinates(
        &self,
        from: WindowId,
        to: WindowId,
        x: i16,
        y: i16,
    ) -> Result<(i16, i16), ConnectionError> {
        let reply = on_window(to, self.conn.translate_coordinates(from, to, x, y)?.reply())?;
        Ok((reply.dst_x, reply.dst_y))
    }

    fn warp_pointer(&self, window: WindowId, x: i16, y: i16) -> Result<(), ConnectionError> {
        self.conn.warp_pointer(NONE, window, 0, 0, 0, 0, x, y)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), ConnectionError> {
        Ok(self.conn.flush()?)
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

fn translate_event(event: Event) -> Option<DisplayEvent> {
    match event {
        Event::CreateNotify(e) => Some(DisplayEvent::WindowCreated(e.window)),
        Event::DestroyNotify(e) => Some(DisplayEvent::WindowDestroyed(e.window)),
        Event::MappingNotify(e) if e.request == Mapping::KEYBOARD || e.request == Mapping::MODIFIER => {
            Some(DisplayEvent::KeymapChanged)
        }
        Event::Error(e) => {
            // Errors of unchecked requests (e.g. SendEvent to a window that
            // just closed) surface here.
            debug!("asynchronous X error: {e:?}");
            None
        }
        other => {
            trace!("ignoring event {other:?}");
            None
        }
    }
}

impl EventSource for X11EventSource {
    fn wait_events(&mut self, timeout: Duration) -> Result<Vec<DisplayEvent>, ConnectionError> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();
        loop {
            while let Some(event) = self.conn.poll_for_event()? {
                events.extend(translate_event(event));
            }
            let now = Instant::now();
            if !events.is_empty() || now >= deadline {
                return Ok(events);
            }
            thread::sleep(POLL_STEP.min(deadline - now));
        }
    }
}
