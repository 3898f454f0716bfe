//! Wire-level decoding of display server data.

pub mod record;

pub use record::{decode_device_events, DeviceEvent, RecordCategory};
