//! Debug logging for mailterm
//!
//! Routes `tracing` events to ~/.config/mailterm/debug.log when enabled.
//! Since the TUI uses raw terminal mode, we log to a file instead of stderr.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config;

const LOG_FILE: &str = "debug.log";

/// Filter used when RUST_LOG is not set
const DEFAULT_FILTER: &str = "mailterm=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initializes debug logging.
/// Does nothing unless enabled; returns the log file path otherwise.
pub fn init(enabled: bool) -> Result<Option<PathBuf>> {
    if !enabled {
        return Ok(None);
    }

    let path = config::ensure_config_dir()?.join(LOG_FILE);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open debug log {:?}", path))?;

    // Write a separator for this session
    writeln!(
        file,
        "\n========== Session started at {} ==========",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_env_filter(env_filter())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;

    Ok(Some(path))
}
