//! Tracing subscriber setup: console on stderr, optional rolling log files.

use std::path::PathBuf;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::Result;

const LOG_FILE_PREFIX: &str = "ci_slack_notify";

/// Logging settings derived from the run configuration.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub debug: bool,
    /// When set, logs are also written to rolling files in this directory.
    pub log_dir: Option<PathBuf>,
}

impl LoggingConfig {
    /// `RUST_LOG` wins; otherwise `debug` or `info` depending on the flag.
    pub fn env_filter(&self) -> EnvFilter {
        let default_level = if self.debug { "debug" } else { "info" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    }
}

pub struct FileLogger {
    log_directory: PathBuf,
    rotation: Rotation,
}

impl FileLogger {
    pub fn new(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            rotation: Rotation::DAILY,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn setup_file_logging(&self) -> Result<(NonBlocking, WorkerGuard)> {
        // Ensure log directory exists
        std::fs::create_dir_all(&self.log_directory)?;

        let file_appender =
            RollingFileAppender::new(self.rotation.clone(), &self.log_directory, LOG_FILE_PREFIX);

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

/// Installs the global subscriber. Console output goes to stderr so stdout
/// only carries the filter diagnostic and the debug payload dump.
///
/// Hold on to the returned guard until exit or buffered file logs are lost.
pub fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match &config.log_dir {
        Some(dir) => {
            let (file_writer, guard) = FileLogger::new(dir.clone()).setup_file_logging()?;
            tracing_subscriber::registry()
                .with(config.env_filter())
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file_writer)
                        .with_ansi(false), // Disable ANSI colors for file logs
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(config.env_filter())
                .with(console)
                .init();
            Ok(None)
        }
    }
}
