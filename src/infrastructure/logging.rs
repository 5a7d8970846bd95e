//! File-based logging setup
//!
//! Writes rolling daily logs under logs/, separated by concern:
//! - logs/main - all application logs (JSON)
//! - logs/error - WARN and above only
//! - logs/stream - transport and multiplexer logs
//!
//! A console layer is kept for development. RUST_LOG overrides the filter.

use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize file + console logging.
///
/// Returns the appender guards, which must stay alive for the duration of
/// the program or buffered log lines are lost.
pub fn init_logging() -> Vec<WorkerGuard> {
    let logs_dir = Path::new("logs");
    for sub in ["main", "error", "stream"] {
        let dir = logs_dir.join(sub);
        if !dir.exists() {
            fs::create_dir_all(&dir).expect("failed to create log directory");
        }
    }

    let mut guards = Vec::new();

    let (main_appender, main_guard) = create_appender("logs/main", "main");
    guards.push(main_guard);
    let (error_appender, error_guard) = create_appender("logs/error", "error");
    guards.push(error_guard);
    let (stream_appender, stream_guard) = create_appender("logs/stream", "stream");
    guards.push(stream_guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let stream_layer = tracing_subscriber::fmt::layer()
        .with_writer(stream_appender)
        .with_ansi(false)
        .with_target(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().contains("stream")
        }));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(stream_layer)
        .with(console_layer)
        .init();

    tracing::info!("logging initialized, files under logs/");

    guards
}

fn create_appender(dir: &str, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);
    tracing_appender::non_blocking(appender)
}
