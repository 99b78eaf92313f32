//! Logging initialisation.
//!
//! Diagnostics go through `tracing`. [`init`] installs a `tracing-subscriber`
//! registry with an env filter and either a pretty or a JSON formatter,
//! writing to stderr or to an append-only log file.
//!
//! # Environment
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `STYLESTORE_LOG` | filter directives (falls back to `RUST_LOG`, then `info`) |
//! | `STYLESTORE_LOG_FORMAT` | `pretty` (default) or `json` |
//! | `STYLESTORE_LOG_FILE` | optional log file path |
//!
//! Counters are emitted through the `metrics` facade; no exporter is
//! installed here, so they are no-ops unless the host installs a recorder.

use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter directive variable.
pub const ENV_LOG: &str = "STYLESTORE_LOG";
/// Output format variable.
pub const ENV_LOG_FORMAT: &str = "STYLESTORE_LOG_FORMAT";
/// Log file variable.
pub const ENV_LOG_FILE: &str = "STYLESTORE_LOG_FILE";

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything other than `json` is pretty.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directives.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
    /// Log file; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds configuration from the process environment.
    ///
    /// `verbose` raises the default level to `debug` when no filter is set.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        Self::from_lookup(verbose, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(verbose: bool, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default_level = if verbose { "debug" } else { "info" };
        let filter = lookup(ENV_LOG)
            .or_else(|| lookup("RUST_LOG"))
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| default_level.to_string());

        Self {
            filter,
            format: lookup(ENV_LOG_FORMAT).map_or(LogFormat::Pretty, |f| LogFormat::parse(&f)),
            file: lookup(ENV_LOG_FILE)
                .filter(|f| !f.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if logging was already initialised, the filter is
/// invalid, or the log file cannot be opened.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(Error::failed("logging_init", "logging already initialized"));
    }

    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| Error::InvalidInput(format!("Invalid log filter '{}': {e}", config.filter)))?;
    let registry = tracing_subscriber::registry().with(filter);

    match (&config.file, config.format) {
        (Some(log_file), LogFormat::Json) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(open_log_file(log_file)?)
                    .with_current_span(true)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init()
            .map_err(init_error)?,
        (Some(log_file), LogFormat::Pretty) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(open_log_file(log_file)?)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init()
            .map_err(init_error)?,
        (None, LogFormat::Json) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init()
            .map_err(init_error)?,
        (None, LogFormat::Pretty) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(false),
            )
            .try_init()
            .map_err(init_error)?,
    }

    LOGGING_INIT
        .set(())
        .map_err(|()| Error::failed("logging_init", "failed to mark logging initialized"))
}

/// Thread-safe file writer for logging.
#[derive(Clone)]
struct LogFileWriter {
    file: Arc<Mutex<File>>,
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Opens a log file for appending, creating parent directories.
fn open_log_file(path: &Path) -> Result<LogFileWriter> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::failed("create_log_dir", e))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::failed("open_log_file", format!("{}: {e}", path.display())))?;

    Ok(LogFileWriter {
        file: Arc::new(Mutex::new(file)),
    })
}

#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::failed("logging_init", e)
}
