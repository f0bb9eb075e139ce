use crate::error::{PanoError, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_FILE_NAME: &str = "pano.log";

/// Append log output to `<log_dir>/pano.log`.
///
/// `RUST_LOG` overrides the level; otherwise `info`, or `debug` when
/// `debug` is set.
pub fn init(log_dir: &Path, debug: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(log_dir)?;
    let log_file = log_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&log_file)?;

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| PanoError::Config(format!("logging already initialised: {}", e)))?;

    tracing::info!("logging to {}", log_file.display());
    Ok(log_file)
}
