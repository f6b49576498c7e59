use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, TelemetryConfig};

/// Initialize logging.
///
/// Stdout by default; append-mode file logging when telemetry is enabled.
/// `RUST_LOG` overrides the `info` default either way.
///
/// # Errors
/// Returns error if the log directory or file cannot be created.
pub fn init(config: &TelemetryConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if !config.enabled {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
        return Ok(());
    }

    let log_path = Config::expand_path(&config.log_path)?;
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("failed to create log directory")?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("failed to open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_target(false)
        .with_ansi(false)
        .init();

    tracing::info!(path = %log_path.display(), "telemetry initialized");
    Ok(())
}
