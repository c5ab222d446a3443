//! Log setup for the CLI.
//!
//! Everything at the `PLANNER_LOG` level (default `info`) goes to a daily
//! rolling file in `<state dir>/logs/`. Warnings and errors are mirrored on
//! stderr so a failing command says why. stdout stays reserved for output.

use planner_core::StorageConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "PLANNER_LOG";
const LOG_FILE_PREFIX: &str = "planner.log";

/// Installs the global subscriber. Keep the returned guard alive until exit
/// or buffered file output is lost.
pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(LevelFilter::WARN);

    if let Err(err) = storage.ensure_dirs() {
        tracing_subscriber::registry().with(stderr_layer).init();
        tracing::warn!(error = %err, "Log directory unavailable, logging to stderr only");
        return None;
    }

    let appender = tracing_appender::rolling::daily(storage.logs_dir(), LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Some(guard)
}
