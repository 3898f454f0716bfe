//! Decoder for data intercepted by the X11 RECORD extension.
//!
//! Each intercepted core device event is one 32-byte `xEvent` in the byte
//! order of the recording client, which is native for our own connections.
//! The high bit of the type byte marks events produced by `SendEvent` and is
//! masked off.  A single RECORD reply may carry several events back to back.
//!
//! The event layouts themselves come from `x11rb-protocol`, the same
//! definitions the engine's connection uses.

use tracing::{debug, trace};
use x11rb_protocol::protocol::xproto::{
    ButtonPressEvent, KeyPressEvent, BUTTON_PRESS_EVENT, KEY_PRESS_EVENT, KEY_RELEASE_EVENT,
};
use x11rb_protocol::x11_utils::TryParse;

/// Size of one core protocol event record.
pub const EVENT_RECORD_SIZE: usize = 32;

/// Core event type codes captured by the engine.
pub const KEY_PRESS: u8 = KEY_PRESS_EVENT;
pub const KEY_RELEASE: u8 = KEY_RELEASE_EVENT;
pub const BUTTON_PRESS: u8 = BUTTON_PRESS_EVENT;

const SEND_EVENT_BIT: u8 = 0x80;

/// Category byte of an `EnableContext` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCategory {
    FromServer,
    FromClient,
    ClientStarted,
    ClientDied,
    StartOfData,
    EndOfData,
}

impl RecordCategory {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::FromServer),
            1 => Some(Self::FromClient),
            2 => Some(Self::ClientStarted),
            3 => Some(Self::ClientDied),
            4 => Some(Self::StartOfData),
            5 => Some(Self::EndOfData),
            _ => None,
        }
    }
}

/// A device event decoded from RECORD data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    KeyPress { keycode: u8 },
    KeyRelease { keycode: u8 },
    ButtonPress { button: u8, root_x: i16, root_y: i16 },
}

/// Decodes every key/button event in `data`.
///
/// Records of other types are skipped, as is a trailing partial record.
pub fn decode_device_events(data: &[u8]) -> Vec<DeviceEvent> {
    let chunks = data.chunks_exact(EVENT_RECORD_SIZE);
    if !chunks.remainder().is_empty() {
        debug!(
            "ignoring {} trailing bytes of RECORD data",
            chunks.remainder().len()
        );
    }

    chunks.filter_map(decode_record).collect()
}

fn decode_record(record: &[u8]) -> Option<DeviceEvent> {
    let kind = record.first()? & !SEND_EVENT_BIT;
    let event = match kind {
        KEY_PRESS | KEY_RELEASE => KeyPressEvent::try_parse(record).map(|(ev, _)| {
            if kind == KEY_PRESS {
                DeviceEvent::KeyPress { keycode: ev.detail }
            } else {
                DeviceEvent::KeyRelease { keycode: ev.detail }
            }
        }),
        BUTTON_PRESS => ButtonPressEvent::try_parse(record).map(|(ev, _)| {
            DeviceEvent::ButtonPress {
                button: ev.detail,
                root_x: ev.root_x,
                root_y: ev.root_y,
            }
        }),
        other => {
            trace!("skipping RECORD event type {other}");
            return None;
        }
    };
    event
        .map_err(|e| debug!("malformed RECORD event of type {kind}: {e:?}"))
        .ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use x11rb_protocol::protocol::xproto::KeyButMask;

    // [type][detail][sequence:2][time:4][root:4][event:4][child:4][root_x:2][root_y:2]...
    fn record(kind: u8, detail: u8, root_x: i16, root_y: i16) -> [u8; EVENT_RECORD_SIZE] {
        let mut r = [0u8; EVENT_RECORD_SIZE];
        r[0] = kind;
        r[1] = detail;
        r[20..22].copy_from_slice(&root_x.to_ne_bytes());
        r[22..24].copy_from_slice(&root_y.to_ne_bytes());
        r[30] = 1;
        r
    }

    #[test]
    fn test_decodes_key_press_and_release() {
        // Arrange
        let mut data = Vec::new();
        data.extend_from_slice(&record(KEY_PRESS, 38, 0, 0));
        data.extend_from_slice(&record(KEY_RELEASE, 38, 0, 0));

        // Act
        let events = decode_device_events(&data);

        // Assert
        assert_eq!(
            events,
            vec![
                DeviceEvent::KeyPress { keycode: 38 },
                DeviceEvent::KeyRelease { keycode: 38 },
            ]
        );
    }

    #[test]
    fn test_decodes_button_press_with_root_coordinates() {
        let events = decode_device_events(&record(BUTTON_PRESS, 1, 640, -3));
        assert_eq!(
            events,
            vec![DeviceEvent::ButtonPress { button: 1, root_x: 640, root_y: -3 }]
        );
    }

    #[test]
    fn test_send_event_bit_is_masked() {
        let events = decode_device_events(&record(KEY_PRESS | 0x80, 10, 0, 0));
        assert_eq!(events, vec![DeviceEvent::KeyPress { keycode: 10 }]);
    }

    #[test]
    fn test_other_event_types_are_skipped() {
        // Arrange: ButtonRelease (5) and MotionNotify (6).
        let mut data = Vec::new();
        data.extend_from_slice(&record(5, 1, 0, 0));
        data.extend_from_slice(&record(6, 0, 0, 0));

        // Act / Assert
        assert!(decode_device_events(&data).is_empty());
    }

    #[test]
    fn test_trailing_partial_record_is_ignored() {
        // Arrange
        let mut data = record(KEY_PRESS, 24, 0, 0).to_vec();
        data.extend_from_slice(&[KEY_PRESS, 25, 0]);

        // Act / Assert
        assert_eq!(
            decode_device_events(&data),
            vec![DeviceEvent::KeyPress { keycode: 24 }]
        );
    }

    #[test]
    fn test_decodes_button_press_serialized_by_the_protocol_crate() {
        // Arrange
        let press = ButtonPressEvent {
            response_type: BUTTON_PRESS,
            detail: 3,
            sequence: 77,
            time: 123_456,
            root: 0x1e1,
            event: 0x0400_0001,
            child: 0,
            root_x: 1919,
            root_y: 1079,
            event_x: 19,
            event_y: 9,
            state: KeyButMask::from(0u16),
            same_screen: true,
        };
        let mut data = <[u8; EVENT_RECORD_SIZE]>::from(&press).to_vec();
        data.extend_from_slice(&record(KEY_RELEASE, 50, 0, 0));

        // Act
        let events = decode_device_events(&data);

        // Assert
        assert_eq!(
            events,
            vec![
                DeviceEvent::ButtonPress { button: 3, root_x: 1919, root_y: 1079 },
                DeviceEvent::KeyRelease { keycode: 50 },
            ]
        );
    }

    #[test]
    fn test_category_from_byte() {
        assert_eq!(RecordCategory::from_u8(0), Some(RecordCategory::FromServer));
        assert_eq!(RecordCategory::from_u8(5), Some(RecordCategory::EndOfData));
        assert_eq!(RecordCategory::from_u8(9), None);
    }
}
