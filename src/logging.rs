use crate::config::LoggingConfig;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "loyalty.log";

/// Logging settings resolved from configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,
    pub log_dir: PathBuf,
    pub rotation: LogRotation,
    pub console_enabled: bool,
    pub file_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl LogRotation {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => LogRotation::Hourly,
            "never" => LogRotation::Never,
            _ => LogRotation::Daily,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            rotation: LogRotation::Daily,
            console_enabled: true,
            file_enabled: false,
        }
    }
}

impl LogConfig {
    pub fn from_logging_config(logging: &LoggingConfig) -> Self {
        Self {
            level: logging.level.clone(),
            log_dir: logging
                .dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("logs")),
            rotation: LogRotation::parse(&logging.rotation),
            console_enabled: logging.console,
            file_enabled: logging.file,
        }
    }

    /// Command-line level wins over the configured one
    pub fn with_level(mut self, level: Option<&str>) -> Self {
        if let Some(level) = level {
            self.level = level.to_string();
        }
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn ensure_log_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Install the global subscriber.
///
/// Logs go to stderr so the report on stdout stays clean. The returned guard
/// flushes the file writer and must be held until the program exits.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = config.env_filter();

    let guard = match (config.console_enabled, config.file_enabled) {
        (_, true) => {
            ensure_log_dir(&config.log_dir)?;
            let file_appender = match config.rotation {
                LogRotation::Daily => rolling::daily(&config.log_dir, LOG_FILE_NAME),
                LogRotation::Hourly => rolling::hourly(&config.log_dir, LOG_FILE_NAME),
                LogRotation::Never => rolling::never(&config.log_dir, LOG_FILE_NAME),
            };
            let (file_writer, guard) = non_blocking(file_appender);

            if config.console_enabled {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr.and(file_writer))
                    .with_target(true)
                    .with_line_number(true)
                    .try_init()
                    .map_err(|e| anyhow::anyhow!(e))?;
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_line_number(true)
                    .try_init()
                    .map_err(|e| anyhow::anyhow!(e))?;
            }
            Some(guard)
        }
        (true, false) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
            None
        }
        (false, false) => {
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::WARN)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
            None
        }
    };

    tracing::debug!(
        level = %config.level,
        console = config.console_enabled,
        file = config.file_enabled,
        log_dir = %config.log_dir.display(),
        "logging initialized"
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
    }

    #[test]
    fn test_log_config_from_logging_config() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            console: false,
            file: true,
            dir: Some(PathBuf::from("/var/log/loyalty")),
            rotation: "hourly".to_string(),
        };

        let config = LogConfig::from_logging_config(&logging);
        assert_eq!(config.level, "debug");
        assert_eq!(config.rotation, LogRotation::Hourly);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/loyalty"));
        assert!(config.file_enabled);
    }

    #[test]
    fn test_cli_level_overrides_config() {
        let config = LogConfig::default().with_level(Some("trace"));
        assert_eq!(config.level, "trace");

        let config = LogConfig::default().with_level(None);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_rotation_parse_falls_back_to_daily() {
        assert_eq!(LogRotation::parse("NEVER"), LogRotation::Never);
        assert_eq!(LogRotation::parse("weekly"), LogRotation::Daily);
    }

    #[test]
    fn test_ensure_log_dir() {
        let temp_dir = tempdir().unwrap();
        let log_dir = temp_dir.path().join("test_logs");

        assert!(ensure_log_dir(&log_dir).is_ok());
        assert!(log_dir.exists());
    }
}
