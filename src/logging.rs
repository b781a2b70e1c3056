//! Logging setup for tabula.
//!
//! Logs go to stderr and to daily rolling files:
//!
//! - `tabula.<date>.log`: everything the env filter lets through
//! - `error.<date>.log`: warnings and errors only
//!
//! The filter defaults to `info` and can be overridden with `RUST_LOG`.
//!
//! ```no_run
//! use tabula::{config::Settings, logging};
//!
//! let settings = Settings::default();
//! logging::init(&settings).expect("Failed to initialize logging");
//! tracing::info!("Server starting");
//! ```

use crate::config::Settings;
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Rotated files kept per log.
const MAX_LOG_FILES: usize = 10;

/// Resolves (and creates) the log directory.
///
/// Uses `Settings::log_dir` when set, otherwise the platform data directory:
/// - Windows: `%APPDATA%/tabula/logs`
/// - macOS: `~/Library/Application Support/tabula/logs`
/// - Linux: `~/.local/share/tabula/logs`
pub fn log_dir(settings: &Settings) -> Result<PathBuf> {
    let log_dir = match &settings.log_dir {
        Some(dir) => dir.clone(),
        None => dirs::data_dir()
            .context("Failed to determine data directory")?
            .join("tabula")
            .join("logs"),
    };

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    Ok(log_dir)
}

fn daily_appender(dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("Failed to create {prefix} log appender"))
}

/// Installs the global subscriber. Call once at startup.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or a file appender
/// fails to open.
pub fn init(settings: &Settings) -> Result<()> {
    let log_dir = log_dir(settings)?;
    let all_logs_appender = daily_appender(&log_dir, "tabula")?;
    let error_logs_appender = daily_appender(&log_dir, "error")?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    // stderr keeps stdout clean for `tabula profile` output
    let console_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!("Logging initialized, log directory: {}", log_dir.display());
    Ok(())
}
