//! Window title and class resolution.
//!
//! Titles come from the first non-empty of `_NET_WM_VISIBLE_NAME`,
//! `_NET_WM_NAME` and `WM_NAME`.  Toolkits often set these on a top-level
//! frame rather than on the client window that holds focus, so with
//! `traverse` the lookup climbs to the parent until something is found or
//! the root is reached.  Any protocol error (typically a window destroyed
//! mid-lookup) resolves to an empty string.

use tracing::trace;
use xkey_core::{WindowId, WindowInfo};

use super::connection::{ConnectionError, ProtocolConnection, TextProperty};

/// Resolves the title of `window`.
pub fn window_title(conn: &dyn ProtocolConnection, window: WindowId, traverse: bool) -> String {
    climb(conn, window, traverse, |w| {
        for property in TextProperty::LOOKUP_ORDER {
            match conn.text_property(w, property) {
                Ok(Some(title)) if !title.is_empty() => return Ok(Some(title)),
                Ok(_) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    })
}

/// Resolves the class of `window` as `"instance.class"`.
pub fn window_class(conn: &dyn ProtocolConnection, window: WindowId, traverse: bool) -> String {
    climb(conn, window, traverse, |w| {
        Ok(conn
            .wm_class(w)?
            .map(|(instance, class)| format!("{instance}.{class}")))
    })
}

/// Resolves both title and class.
pub fn window_info(conn: &dyn ProtocolConnection, window: WindowId, traverse: bool) -> WindowInfo {
    WindowInfo::new(
        window_title(conn, window, traverse),
        window_class(conn, window, traverse),
    )
}

fn climb<F>(conn: &dyn ProtocolConnection, window: WindowId, traverse: bool, read: F) -> String
where
    F: Fn(WindowId) -> Result<Option<String>, ConnectionError>,
{
    let root = conn.root();
    let mut current = window;
    loop {
        if current == root {
            return String::new();
        }
        match read(current) {
            Ok(Some(value)) => return value,
            Ok(None) => {}
            Err(e) => {
                trace!("window {current:#x} lookup failed: {e}");
                return String::new();
            }
        }
        if !traverse {
            return String::new();
        }
        match conn.parent(current) {
            Ok(Some(parent)) => current = parent,
            Ok(None) => return String::new(),
            Err(e) => {
                trace!("window {current:#x} parent lookup failed: {e}");
                return String::new();
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
