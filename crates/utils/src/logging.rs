//! provides logging helpers

use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::util::TryInitError;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("log file path `{0}` has no file name")]
    NoFileName(PathBuf),

    #[error("global subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

fn env_filter() -> filter::EnvFilter {
    filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy()
}

/// initiate the global tracing subscriber
///
/// Does nothing when a subscriber is already installed, which happens when the
/// agent library is loaded into a host that configured logging itself.
pub fn init() {
    if let Err(err) = try_init() {
        tracing::debug!("logging already initialized: {err}");
    }
}

/// initiate the global tracing subscriber, reporting whether it was installed
pub fn try_init() -> Result<(), LoggingError> {
    let fmt_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter());

    registry().with(fmt_layer).try_init()?;
    Ok(())
}

/// initiate the global tracing subscriber, mirroring every event into `log_file`
///
/// The returned guard flushes the file writer when dropped; keep it alive for the
/// lifetime of the process.
pub fn init_with_file(log_file: &Path) -> Result<WorkerGuard, LoggingError> {
    let file_name = log_file
        .file_name()
        .ok_or_else(|| LoggingError::NoFileName(log_file.to_path_buf()))?;
    let directory = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(rolling::never(directory, file_name));

    let fmt_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter());

    let file_layer = layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(env_filter());

    registry().with(fmt_layer).with(file_layer).try_init()?;
    Ok(file_guard)
}
