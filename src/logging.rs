//! # Logging Setup
//!
//! Console output plus an optional append-only log file, both driven by
//! `tracing`. `RUST_LOG` overrides the configured level when set.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{PadBridgeError, Result};

/// Filter built from `level` alone, ignoring the environment
///
/// # Errors
///
/// Returns [`PadBridgeError::Logging`] if `level` is not a valid filter
/// directive.
pub fn level_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| PadBridgeError::Logging(format!("invalid log level '{}': {}", level, e)))
}

/// `RUST_LOG` if set and valid, else the configured level
fn env_or_level(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => level_filter(level),
    }
}

/// Install the global subscriber
///
/// # Returns
///
/// The file writer's guard when file logging is enabled. Keep it alive for
/// the life of the process; dropping it flushes and stops the writer.
///
/// # Errors
///
/// Returns error if the level is invalid, the log file cannot be opened, or
/// a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_or_level(&config.level)?;

    let (file_layer, guard) = match config.file_path() {
        Some(path) => {
            let appender = file_appender(path)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| PadBridgeError::Logging(e.to_string()))?;

    Ok(guard)
}

/// Appender that never rotates, so every run appends to the same file
fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            PadBridgeError::Logging(format!("invalid log file path: {}", path.display()))
        })?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .map_err(|e| PadBridgeError::Logging(format!("cannot open {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_accepts_levels() {
        for level in ["error", "warn", "info", "debug", "trace", "pad_bridge=debug,info"] {
            assert!(level_filter(level).is_ok(), "level {}", level);
        }
    }

    #[test]
    fn test_level_filter_rejects_garbage() {
        assert!(matches!(
            level_filter("pad_bridge=loud"),
            Err(PadBridgeError::Logging(_))
        ));
    }

    #[test]
    fn test_file_appender_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pad_bridge.log");
        assert!(file_appender(&path).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_file_appender_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("pad_bridge.log");
        // The appender creates parent directories
        assert!(file_appender(&path).is_ok());
    }
}
