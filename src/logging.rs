//! Tracing subscriber setup: stderr always, plus a daily-rolling file when a
//! log directory is configured.

use crate::config::LoggingConfig;
use crate::error::{Result, WatchError};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when neither `RUST_LOG` nor the config names one.
pub const DEFAULT_FILTER: &str = "sbs_watch=info";

/// Build the filter: `RUST_LOG` wins over the configured directive.
///
/// # Errors
///
/// Returns [`WatchError::Config`] if the configured directive is malformed.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = config.filter.as_deref().unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directive)
        .map_err(|e| WatchError::Config(format!("invalid logging.filter {directive:?}: {e}")))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
///
/// # Errors
///
/// Returns [`WatchError::Config`] if the filter is invalid, the log directory
/// cannot be created, or a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(config)?;
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("sbs-watch")
                .filename_suffix("log")
                .build(dir)
                .map_err(|e| {
                    WatchError::Config(format!("cannot open log files in {}: {e}", dir.display()))
                })?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| WatchError::Config(format!("logging already initialised: {e}")))?;
    Ok(guard)
}
