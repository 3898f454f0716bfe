//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the engine settings and hotkey list from a
//! TOML file in the XDG config directory, providing defaults when the file
//! does not exist yet (first run), and writes it back on request.

pub mod config;
