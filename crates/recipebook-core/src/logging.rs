//! Logging setup for applications embedding the recipe store
//!
//! The store itself only emits `tracing` events. Call [`init_logging`] once
//! at startup to write them to the configured log file.

use std::fs::OpenOptions;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Environment variable holding the log level (e.g. `debug`)
pub const LOG_ENV_VAR: &str = "RECIPEBOOK_LOG";

/// Initialize file logging
///
/// Only initializes if RECIPEBOOK_LOG is set. Logs are appended to
/// `config.log_path()`. Returns whether a subscriber was installed by this
/// call; an already installed global subscriber is left in place.
pub fn init_logging(config: &Config) -> Result<bool> {
    let Ok(level) = std::env::var(LOG_ENV_VAR) else {
        return Ok(false);
    };

    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {:?}", parent))?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter_directive(&level)))
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init()
        .is_ok();

    if installed {
        info!("Logging initialized to {:?}", log_path);
    }
    Ok(installed)
}

/// Filter directive scoping `level` to this crate
pub fn filter_directive(level: &str) -> String {
    let level = level.trim();
    let level = if level.is_empty() { "info" } else { level };
    format!("recipebook_core={}", level)
}
