// crates/observability/src/lib.rs
//! Tracing setup for syncwatch binaries.
//!
//! Libraries only emit `tracing` events; the host installs exactly one
//! subscriber through [`init_tracing`]. Output goes to stderr so stdout stays
//! free for progress rendering and JSON lines.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "SYNCWATCH_LOG";

/// Quiet by default; the progress display is the primary output.
pub const DEFAULT_DIRECTIVE: &str = "warn";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Explicit filter directive (`debug`, `syncwatch_core=trace`, ...).
    /// Wins over the environment.
    pub level: Option<String>,
    pub format: LogFormat,
    /// Also append plain-text logs to this file.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid log filter {directive:?}: {source}")]
    Filter {
        directive: String,
        #[source]
        source: ParseError,
    },

    #[error("log file path {0:?} has no file name")]
    LogPath(PathBuf),

    #[error(transparent)]
    AlreadyInstalled(#[from] TryInitError),
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process when logging to
/// a file; dropping it flushes and stops the background writer.
pub fn init_tracing(options: &LogOptions) -> Result<Option<WorkerGuard>, InitError> {
    let filter = build_filter(options.level.as_deref(), |key| std::env::var(key).ok())?;

    let (file_layer, guard) = match &options.file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    match options.format {
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
    }
    Ok(guard)
}

/// Precedence: explicit directive, then `SYNCWATCH_LOG`, then `RUST_LOG`,
/// then [`DEFAULT_DIRECTIVE`].
fn filter_directive(level: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> String {
    level
        .map(str::to_string)
        .or_else(|| lookup(LOG_ENV))
        .or_else(|| lookup("RUST_LOG"))
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

fn build_filter(
    level: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<EnvFilter, InitError> {
    let directive = filter_directive(level, lookup);
    EnvFilter::try_new(&directive).map_err(|source| InitError::Filter { directive, source })
}

fn split_log_path(path: &Path) -> Result<(&Path, &Path), InitError> {
    let name = path
        .file_name()
        .ok_or_else(|| InitError::LogPath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((dir, Path::new(name)))
}
