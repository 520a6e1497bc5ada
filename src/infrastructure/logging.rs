//! Centralized file-based logging system
//!
//! Writes logs to files under the configured directory, separated by type:
//! - main/ - General application logs (JSON)
//! - error/ - Error and warning logs only
//! - ws/ - WebSocket connection and pool logs
//! - exchange/ - Venue decoder logs
//! - latency/ - Periodic latency percentile summaries

use crate::infrastructure::config::LoggingConfig;
use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::{filter_fn, LevelFilter},
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log file categories (one subdirectory each)
pub const LOG_TYPES: [&str; 5] = ["main", "error", "ws", "exchange", "latency"];

/// Initialize centralized file logging
///
/// Creates the log directories and sets up file appenders for each log type.
/// Returns WorkerGuards which must be kept alive for the duration of the program.
pub fn init_logging(config: &LoggingConfig) -> io::Result<Vec<WorkerGuard>> {
    create_log_dirs(&config.dir)?;

    let mut guards = Vec::new();
    let mut appender = |name: &str| {
        let (writer, guard) = create_appender(&config.dir.join(name), name);
        guards.push(guard);
        writer
    };

    // Main log - all logs
    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(appender("main"))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    // Error log - ERROR and WARN only
    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(appender("error"))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(LevelFilter::WARN);

    // WebSocket log - connection, heartbeat and pool
    let ws_layer = tracing_subscriber::fmt::layer()
        .with_writer(appender("ws"))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(filter_fn(|metadata| is_ws_target(metadata.target())));

    // Exchange log - venue handlers
    let exchange_layer = tracing_subscriber::fmt::layer()
        .with_writer(appender("exchange"))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(filter_fn(|metadata| is_exchange_target(metadata.target())));

    // Latency log - percentile summaries
    let latency_layer = tracing_subscriber::fmt::layer()
        .with_writer(appender("latency"))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(filter_fn(|metadata| is_latency_target(metadata.target())));

    // Console layer for development
    let console_layer = config.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
    });

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(main_layer)
        .with(error_layer)
        .with(ws_layer)
        .with(exchange_layer)
        .with(latency_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    tracing::info!(dir = %config.dir.display(), "Logging system initialized");

    Ok(guards)
}

/// Create the root and one subdirectory per log type
pub fn create_log_dirs(root: &Path) -> io::Result<()> {
    for log_type in LOG_TYPES {
        fs::create_dir_all(root.join(log_type))?;
    }
    Ok(())
}

/// Create a rolling file appender
fn create_appender(dir: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);
    tracing_appender::non_blocking(appender)
}

fn is_ws_target(target: &str) -> bool {
    target == "ws" || target.contains("::ws")
}

fn is_exchange_target(target: &str) -> bool {
    target == "exchange" || target.contains("::exchanges")
}

fn is_latency_target(target: &str) -> bool {
    target == "latency" || target.ends_with("::latency")
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_ws {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "ws", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_exchange {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "exchange", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_latency {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "latency", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_main {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "main", $level, $($arg)+)
    };
}
