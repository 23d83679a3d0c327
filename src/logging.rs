//! File logging. The terminal belongs to the TUI, so everything goes to
//! `cadence.log` through a non-blocking writer.

use std::path::PathBuf;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{LoggingSettings, default_state_dir};

pub const LOG_FILE_NAME: &str = "cadence.log";

/// Install the global subscriber. Returns `None` when logging is disabled;
/// otherwise the guard must live until shutdown so buffered lines get flushed.
pub fn init(settings: &LoggingSettings) -> anyhow::Result<Option<WorkerGuard>> {
    if !settings.enabled {
        return Ok(None);
    }

    let log_dir = log_dir(settings)?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| build_filter(&settings.level));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("installing the tracing subscriber")?;

    Ok(Some(guard))
}

fn log_dir(settings: &LoggingSettings) -> anyhow::Result<PathBuf> {
    match &settings.directory {
        Some(dir) => Ok(dir.clone()),
        None => default_state_dir().context("cannot determine a state directory for logs"),
    }
}

/// Unparseable levels fall back to `info`.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}
