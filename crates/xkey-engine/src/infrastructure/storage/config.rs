//! TOML-based configuration of the engine.
//!
//! Reads and writes [`AppConfig`] at `$XDG_CONFIG_HOME/xkey/engine.toml`
//! (`~/.config/xkey/engine.toml` when `XDG_CONFIG_HOME` is unset).
//!
//! ```toml
//! [engine]
//! log_level = "info"
//! backend = "record"            # or "accessibility"
//! poll_interval_ms = 1000
//! keymap_settle_ms = 200
//! clipboard_restore_ms = 100
//! super_workaround = "auto"     # "always" | "never"
//! slow_repeat_always = false
//! slow_repeat_apps = ".*VirtualBox.*|krdc.Krdc"   # empty: no window
//!
//! [[hotkeys]]
//! key = "<f5>"
//! modifiers = ["<ctrl>", "<alt>"]
//! filter = "firefox"
//! recursive = false
//! enabled = true
//! ```
//!
//! # Serde default values
//!
//! Every field has a default (`#[serde(default = "some_fn")]`), so a missing
//! file, a missing section and a missing key all fall back to the values
//! shown above.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xkey_core::{FilterError, HotkeyItem, WindowFilter};

use crate::application::engine::EngineSettings;
use crate::application::send_input::SlowRepeat;
use crate::infrastructure::shell;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    #[error("could not determine the config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `slow_repeat_apps` is not a valid pattern.
    #[error("invalid slow_repeat_apps: {0}")]
    InvalidFilter(#[from] FilterError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub hotkeys: Vec<HotkeyItem>,
}

/// Which capture backend to start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Record,
    Accessibility,
}

impl BackendKind {
    /// The backend to fall back to.
    pub fn other(self) -> Self {
        match self {
            BackendKind::Record => BackendKind::Accessibility,
            BackendKind::Accessibility => BackendKind::Record,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Record => "record",
            BackendKind::Accessibility => "accessibility",
        })
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "record" => Ok(BackendKind::Record),
            "accessibility" => Ok(BackendKind::Accessibility),
            other => Err(format!(
                "unknown backend {other:?} (expected \"record\" or \"accessibility\")"
            )),
        }
    }
}

/// Whether global Super hotkeys are repeated on every window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuperWorkaround {
    /// On when a shell known to swallow root Super grabs is running.
    #[default]
    Auto,
    Always,
    Never,
}

impl SuperWorkaround {
    /// Resolves `Auto` by looking at the running processes.
    pub fn resolve(self) -> bool {
        match self {
            SuperWorkaround::Always => true,
            SuperWorkaround::Never => false,
            SuperWorkaround::Auto => shell::super_grab_workaround_needed(),
        }
    }
}

/// Engine behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub backend: BackendKind,
    /// Upper bound of one structural event wait.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delay between a keymap change and re-initialization.
    #[serde(default = "default_keymap_settle_ms")]
    pub keymap_settle_ms: u64,
    /// Delay before the clipboard is restored after a clipboard paste.
    #[serde(default = "default_clipboard_restore_ms")]
    pub clipboard_restore_ms: u64,
    #[serde(default)]
    pub super_workaround: SuperWorkaround,
    /// Pause before repeated keycodes in every window.
    #[serde(default)]
    pub slow_repeat_always: bool,
    /// Title/class pattern of the windows that need paced typing.
    #[serde(default)]
    pub slow_repeat_apps: String,
}

impl EngineConfig {
    /// Engine settings, with the Super workaround resolved.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFilter`] if `slow_repeat_apps` does not
    /// compile.
    pub fn settings(&self) -> Result<EngineSettings, ConfigError> {
        let slow_repeat = if self.slow_repeat_always {
            SlowRepeat::Always
        } else if self.slow_repeat_apps.is_empty() {
            SlowRepeat::Off
        } else {
            SlowRepeat::For(WindowFilter::new(&self.slow_repeat_apps)?)
        };
        Ok(EngineSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            keymap_settle: Duration::from_millis(self.keymap_settle_ms),
            clipboard_restore: Duration::from_millis(self.clipboard_restore_ms),
            super_workaround: self.super_workaround.resolve(),
            slow_repeat,
        })
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_keymap_settle_ms() -> u64 {
    200
}
fn default_clipboard_restore_ms() -> u64 {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            backend: BackendKind::default(),
            poll_interval_ms: default_poll_interval_ms(),
            keymap_settle_ms: default_keymap_settle_ms(),
            clipboard_restore_ms: default_clipboard_restore_ms(),
            super_workaround: SuperWorkaround::default(),
            slow_repeat_always: false,
            slow_repeat_apps: String::new(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// The `xkey` directory under the XDG config home.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when neither
/// `XDG_CONFIG_HOME` nor `HOME` is set.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok_or(ConfigError::NoPlatformConfigDir)?;
    Ok(base.join("xkey"))
}

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("engine.toml"))
}

/// Loads the config from its default location.  See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to its default location.  See [`save_config_to`].
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Writes `config` to `path`, creating the directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
