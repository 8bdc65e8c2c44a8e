//! Log sink setup
//!
//! Console output on stderr plus an optional daily-rolling file under
//! `LOG_PATH`. Events carry structured fields (`component`, `sql`, `error`,
//! `elapsed_ms`); parameter values are never recorded.

use std::io;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::DbError;

pub const DEFAULT_LOG_NAME: &str = "sqlpool";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// File name prefix; files are named `<name>.<date>.log`.
    pub name: String,
    /// Directory of the rolling file. `None` logs to the console only.
    pub path: Option<PathBuf>,
    pub level: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_LOG_NAME.to_string(),
            path: None,
            level: "info".to_string(),
        }
    }
}

impl LogOptions {
    /// Reads `LOG_NAME`, `LOG_PATH` and `LOG_LEVEL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: std::env::var("LOG_NAME")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.name),
            path: std::env::var_os("LOG_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            level: std::env::var("LOG_LEVEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.level),
        }
    }
}

/// Keeps the file writer alive; buffered lines are flushed on drop.
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

/// Installs the global subscriber. `RUST_LOG` directives override `level`.
pub fn init(options: &LogOptions) -> Result<LogGuard, DbError> {
    let level = parse_log_level(&options.level)?;
    let filter = || {
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy()
    };

    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(filter());

    let (file, guard) = match &options.path {
        Some(dir) => {
            let appender = file_appender(dir, &options.name)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| DbError::Configuration(format!("failed to install logger: {}", e)))?;

    Ok(LogGuard { _guard: guard })
}

fn file_appender(dir: &Path, name: &str) -> Result<RollingFileAppender, DbError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(name)
        .filename_suffix("log")
        .build(dir)
        .map_err(|e| DbError::Configuration(format!("failed to open log file: {}", e)))
}

pub fn parse_log_level(level: &str) -> Result<Level, DbError> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(DbError::Configuration(format!(
            "invalid log level: {}",
            level
        ))),
    }
}
