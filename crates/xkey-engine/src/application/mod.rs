//! Application layer of the input engine.
//!
//! # What lives here? (for beginners)
//!
//! Everything that decides *what* to ask the X server, written against the
//! [`connection::ProtocolConnection`] trait so it runs unchanged against the
//! in-memory server used by tests.
//!
//! | Module          | Responsibility                                             |
//! |-----------------|------------------------------------------------------------|
//! | `connection`    | The display server seam and its error type                 |
//! | `capture`       | The capture backend seam (`record`, `accessibility`)       |
//! | `clipboard`     | The clipboard seam used by clipboard sends                 |
//! | `consumer`      | Callbacks for decoded input, and the hotkey source         |
//! | `dispatcher`    | Command FIFO and its single worker thread                  |
//! | `engine`        | `InputEngine` lifecycle and the `EngineHandle` facade      |
//! | `keyboard`      | Keymap snapshot, modifier masks, keycode resolution        |
//! | `grab_hotkeys`  | Grabbing hotkeys across the window tree                    |
//! | `send_input`    | Typing strings and keys, remapping spare keycodes          |
//! | `window_info`   | Window title and class lookup                              |
//! | `listener`      | Window creation/destruction and keymap change handling     |
//!
//! **Dependency rule**: nothing in this layer imports `infrastructure`, except
//! the unit tests, which run against `infrastructure::connection::mock`.

pub mod capture;
pub mod clipboard;
pub mod connection;
pub mod consumer;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod grab_hotkeys;
pub mod keyboard;
pub mod listener;
pub mod send_input;
pub mod window_info;
