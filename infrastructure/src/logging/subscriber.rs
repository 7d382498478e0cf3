//! Process-wide `tracing` subscriber.

use crate::config::{FileLoggingConfig, LOG_LEVELS};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Install the global subscriber.
///
/// Level comes from `[logging] level`; `RUST_LOG` overrides it. With
/// `[logging] directory` set, events are also written to a daily-rolling
/// file; keep the returned guard alive until shutdown so the file writer
/// flushes.
pub fn init_tracing(config: &FileLoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.level)));

    let stderr = fmt::layer()
        .with_target(false)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Configured level, or "info" when it is not a known level
fn default_directive(level: &str) -> String {
    let level = level.trim().to_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        level
    } else {
        "info".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("DEBUG"), "debug");
        assert_eq!(default_directive(" warn "), "warn");
        assert_eq!(default_directive("verbose"), "info");
    }
}
