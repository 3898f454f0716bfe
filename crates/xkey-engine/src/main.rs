//! xkey input engine entry point.
//!
//! Loads the configuration, connects to the X display, starts the engine
//! with the configured hotkeys and a capture backend, then runs until
//! Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                -- engine.toml (or --config)
//!  └─ x11::connect()               -- request + event handles
//!  └─ InputEngine::start()         -- worker + listener threads
//!  └─ attach_with_fallback()       -- record, else accessibility (or reverse)
//!  └─ ctrl_c().await
//!  └─ engine.cancel()              -- on a blocking thread
//! ```
//!
//! The binary ships a consumer that logs every key press, modifier change
//! and click it receives.  Embedding applications provide their own
//! [`InputConsumer`] through the library.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use xkey_core::{Modifier, WindowInfo};
use xkey_engine::infrastructure::storage::config::{self, BackendKind};
use xkey_engine::{EngineHandle, InputConsumer};

/// Command-line arguments.  Each one overrides the config file.
#[derive(Debug, Parser)]
#[command(name = "xkey-engine", version, about)]
struct Cli {
    /// Path of the TOML config file (default: $XDG_CONFIG_HOME/xkey/engine.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture backend: "record" or "accessibility".
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Log level, e.g. "debug" ("RUST_LOG" takes precedence).
    #[arg(long)]
    log_level: Option<String>,

    /// X display to connect to (default: $DISPLAY).
    #[arg(long)]
    display: Option<String>,
}

/// Logs the input the engine reports.
#[derive(Default)]
struct LoggingConsumer {
    handle: OnceLock<EngineHandle>,
    shift: AtomicBool,
    numlock: AtomicBool,
}

impl InputConsumer for LoggingConsumer {
    fn on_modifier_down(&self, modifier: Modifier) {
        match modifier {
            Modifier::Shift => self.shift.store(true, Ordering::Relaxed),
            Modifier::NumLock => {
                self.numlock.fetch_xor(true, Ordering::Relaxed);
            }
            _ => {}
        }
        info!("modifier down: {modifier}");
    }

    fn on_modifier_up(&self, modifier: Modifier) {
        if modifier == Modifier::Shift {
            self.shift.store(false, Ordering::Relaxed);
        }
        info!("modifier up: {modifier}");
    }

    fn on_lock_state(&self, modifier: Modifier, on: bool) {
        if modifier == Modifier::NumLock {
            self.numlock.store(on, Ordering::Relaxed);
        }
        info!("{modifier} is {}", if on { "on" } else { "off" });
    }

    fn on_key_press(&self, keycode: u8, title: &str, class: &str) {
        match self.handle.get() {
            Some(handle) => {
                let key = handle.lookup_key(
                    keycode,
                    self.shift.load(Ordering::Relaxed),
                    self.numlock.load(Ordering::Relaxed),
                    false,
                );
                info!("key {key} (keycode {keycode}) in {title:?} [{class}]");
            }
            None => info!("keycode {keycode} in {title:?} [{class}]"),
        }
    }

    fn on_mouse_click(
        &self,
        root_x: i16,
        root_y: i16,
        rel_x: i16,
        rel_y: i16,
        button: u8,
        window: &WindowInfo,
    ) {
        info!(
            "button {button} at ({root_x}, {root_y}), ({rel_x}, {rel_y}) in {:?} [{}]",
            window.title, window.class
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    if let Some(backend) = cli.backend {
        cfg.engine.backend = backend;
    }
    if let Some(level) = cli.log_level {
        cfg.engine.log_level = level;
    }

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.engine.log_level)),
        )
        .init();

    info!("xkey engine starting");
    run(cfg, cli.display).await
}

#[cfg(target_os = "linux")]
async fn run(cfg: config::AppConfig, display: Option<String>) -> anyhow::Result<()> {
    use xkey_engine::infrastructure::capture::attach_with_fallback;
    use xkey_engine::infrastructure::clipboard::system_clipboard_factory;
    use xkey_engine::infrastructure::connection::x11;
    use xkey_engine::{InputEngine, StaticHotkeys};

    let (conn, events) = x11::connect(display.as_deref())?;
    let consumer = Arc::new(LoggingConsumer::default());
    let hotkeys = Arc::new(StaticHotkeys::new(cfg.hotkeys.clone()));

    let mut engine = InputEngine::start(
        Box::new(conn),
        Box::new(events),
        consumer.clone(),
        hotkeys,
        system_clipboard_factory(),
        cfg.engine.settings()?,
    )?;
    let _ = consumer.handle.set(engine.handle());

    let backend = attach_with_fallback(&mut engine, cfg.engine.backend, display.as_deref())?;
    info!(
        "xkey engine ready: {} hotkeys, {backend} capture. Press Ctrl-C to stop.",
        cfg.hotkeys.len()
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // Joining the worker threads blocks.
    tokio::task::spawn_blocking(move || engine.cancel()).await?;
    info!("xkey engine stopped");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn run(_cfg: config::AppConfig, _display: Option<String>) -> anyhow::Result<()> {
    anyhow::bail!("xkey-engine requires an X11 session (Linux)")
}
