//! Tracing subscriber setup

use crate::config::LoggingSettings;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Log file name inside the configured log directory
pub const LOG_FILE_NAME: &str = "ltrstore.log";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Returns an error if a
/// global subscriber is already installed.
pub fn init_tracing(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))?;

    let stdout_layer = if settings.json {
        fmt::layer().with_writer(std::io::stdout).json().boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(true)
            .boxed()
    };

    let file_layer = match &settings.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_NAME);
            Some(fmt::layer().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(filter)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_reports_error() {
        let settings = LoggingSettings::default();
        // The first call may lose against another test's subscriber; the
        // second one must always fail.
        let _ = init_tracing(&settings);
        assert!(init_tracing(&settings).is_err());
    }
}
