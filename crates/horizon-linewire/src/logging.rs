//! Subscriber setup for the Linewire binaries.
//!
//! Every run writes its own log file, `<dir>/<product>-<yyyyMMdd-HHmmss>.log`,
//! through a non-blocking `tracing-appender` writer. Warnings and errors are
//! also echoed to stderr. The level comes from `RUST_LOG` and defaults to
//! `info`, which records every received and sent line.
//!
//! The returned [`LogGuard`] must be held until exit: it brackets the run
//! with `=== Begin ... ===` / `=== End ... ===` lines and flushes the file
//! when dropped.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use horizon_linewire_core::logging::FILE_STAMP_FORMAT;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{LinewireError, Result};
use crate::product::ProductInfo;

/// Target used for process lifecycle lines.
pub const PROGRAM_TARGET: &str = "horizon_linewire::program";

/// Default directory for per-run log files.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Keeps the log writer alive and marks the end of the run on drop.
#[must_use = "logging stops when the guard is dropped"]
pub struct LogGuard {
    path: PathBuf,
    title: String,
    _worker: WorkerGuard,
}

impl LogGuard {
    /// The log file of this run.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        tracing::info!(target: PROGRAM_TARGET, "=== End {} ===", self.title);
    }
}

impl std::fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogGuard").field("path", &self.path).finish()
    }
}

/// Log file name for a run started at `at`.
pub fn log_file_name(product: &ProductInfo, at: DateTime<Local>) -> String {
    format!("{}-{}.log", product.file_stem(), at.format(FILE_STAMP_FORMAT))
}

/// Install the global subscriber and open this run's log file.
pub fn init(product: &ProductInfo, log_dir: &Path) -> Result<LogGuard> {
    fs::create_dir_all(log_dir).map_err(|e| LinewireError::io(log_dir, e))?;

    let file_name = log_file_name(product, Local::now());
    let path = log_dir.join(&file_name);
    let appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let file_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(file_filter);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| LinewireError::Logging(e.to_string()))?;

    let title = product.title();
    tracing::info!(target: PROGRAM_TARGET, "=== Begin {title} ===");
    tracing::debug!(target: PROGRAM_TARGET, path = %path.display(), "log file opened");

    Ok(LogGuard {
        path,
        title,
        _worker: worker,
    })
}
