//! Logging system configuration and initialization
//!
//! Console output always, plus an optional daily-rolling file appender in
//! the application data directory. The non-blocking writer guard must stay
//! alive for the process lifetime, so it is parked in a global.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::infrastructure::config::ConfigManager;

// Keeps the log file writer alive after init returns.
static LOG_GUARDS: Lazy<Mutex<Vec<non_blocking::WorkerGuard>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// Log directory inside the application data directory.
pub fn get_log_directory() -> Result<PathBuf> {
    Ok(ConfigManager::app_data_dir()?.join("logs"))
}

/// Initialize console-only logging, filter from `RUST_LOG` (default `info`).
pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}

/// Initialize logging with console output and a daily-rolling log file.
pub fn init_logging_with_file() -> Result<()> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {log_dir:?}"))?;

    let file_appender = rolling::daily(&log_dir, "vine-tools.log");
    let (file_writer, guard) = non_blocking(file_appender);
    LOG_GUARDS
        .lock()
        .expect("log guard mutex poisoned")
        .push(guard);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .context("Failed to initialize logging")?;

    tracing::info!(dir = ?log_dir, "file logging enabled");
    Ok(())
}
