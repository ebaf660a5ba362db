//! Logging initialization.
//!
//! Human-readable output goes to stderr. When `STATUSWATCH_LOG_DIR` is set,
//! JSON lines are also written to a daily-rotated file in that directory.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{env_var, env_var_or};

const LOG_FILE_PREFIX: &str = "statuswatch.log";

/// Directory for JSON log files, if file logging is enabled.
pub fn log_dir() -> Option<PathBuf> {
    env_var("STATUSWATCH_LOG_DIR").map(PathBuf::from)
}

fn env_filter() -> EnvFilter {
    let level = env_var_or("STATUSWATCH_LOG_LEVEL", "info");
    EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
pub fn init() -> anyhow::Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir() {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_current_span(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
