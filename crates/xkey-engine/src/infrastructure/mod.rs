//! Infrastructure layer of the input engine.
//!
//! Contains the adapters behind the application-layer traits.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `xkey_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`connection`** – `X11Connection` and `X11EventSource` over `x11rb`
//!   (Linux only), plus `MockDisplay`, an in-memory X server for tests.
//!
//! - **`capture`** – The `record` backend (X RECORD extension), the
//!   `accessibility` backend (AT-SPI registry events) and a mock backend that
//!   lets tests inject key and button events.
//!
//! - **`clipboard`** – `SystemClipboard` over `arboard`, and an in-memory
//!   clipboard for tests.
//!
//! - **`storage`** – TOML configuration (engine settings and hotkeys).
//!
//! - **`shell`** – Detection of desktop shells that need per-window Super
//!   grabs.

pub mod capture;
pub mod clipboard;
pub mod connection;
pub mod shell;
pub mod storage;
