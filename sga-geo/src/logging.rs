//! Tracing subscriber setup for applications embedding the library.
//!
//! The library itself only emits `tracing` events. Binaries and tests that
//! want to see them call [`init_logging`] once at startup.

use std::path::PathBuf;

use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "sga_geo=info";

/// Local timestamp with millisecond precision, e.g. `2026-10-18 08:30:05.123`.
pub const LOG_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");

/// Default log file name prefix.
pub const DEFAULT_LOG_FILE_PREFIX: &str = "sga-geo.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Where and how verbosely to log.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
    /// Write daily-rolling files here instead of stdout.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            directory: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

/// `RUST_LOG` if set and valid, otherwise `fallback`.
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the global subscriber.
///
/// With a log directory, events go through a non-blocking daily-rolling file
/// writer and the returned guard must be kept alive until exit; dropping it
/// flushes pending lines.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.filter))
        .with_timer(LocalTime::new(LOG_TIMESTAMP_FORMAT))
        .with_target(true);

    match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).map_err(|source| LoggingError::Directory {
                path: directory.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| LoggingError::Init(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            builder
                .try_init()
                .map_err(|e| LoggingError::Init(e.to_string()))?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.filter, "sga_geo=info");
        assert!(config.directory.is_none());
    }

    #[test]
    fn test_timestamp_format() {
        let at = time::macros::datetime!(2026-10-18 08:30:05.123_456 UTC);
        assert_eq!(
            at.format(LOG_TIMESTAMP_FORMAT).unwrap(),
            "2026-10-18 08:30:05.123"
        );
    }

    #[test]
    fn test_file_logging_creates_directory() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        let config = LoggingConfig::default()
            .with_filter("sga_geo=debug")
            .with_directory(&logs);

        // Another test may already own the global subscriber.
        if let Ok(guard) = init_logging(&config) {
            assert!(guard.is_some());
        }
        assert!(logs.is_dir());
    }
}
