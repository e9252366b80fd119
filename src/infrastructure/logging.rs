//! Logging system configuration and initialization
//!
//! Console and/or file output, optional JSON lines for the file, and an
//! `RUST_LOG` override. Dependency noise is filtered unless the level is `trace`.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub use crate::infrastructure::config::LoggingConfig;
use crate::infrastructure::config::ConfigManager;

// Keeps the non-blocking file writers alive for the life of the process
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Targets that are chatty at debug level
const NOISY_TARGETS: &[(&str, &str)] = &[
    ("reqwest", "info"),
    ("hyper", "warn"),
    ("hyper_util", "warn"),
    ("h2", "warn"),
    ("html5ever", "warn"),
    ("selectors", "warn"),
    ("tokio", "info"),
];

/// Directory for log files: configured, or `<data dir>/domain-sales-tracker/logs`
pub fn get_log_directory(config: &LoggingConfig) -> Result<PathBuf> {
    match &config.log_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(ConfigManager::get_app_data_dir()?.join("logs")),
    }
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    if !config.level.to_lowercase().contains("trace") {
        for (target, level) in NOISY_TARGETS {
            filter = filter.add_directive(format!("{target}={level}").parse()?);
        }
    }
    Ok(filter)
}

/// Initialize logging with custom configuration
///
/// Fails when no output is enabled or a global subscriber is already set.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    if !config.console_output && !config.file_output {
        return Err(anyhow!("Logging needs console or file output enabled"));
    }

    let env_filter = build_env_filter(config)?;

    let file_layer = if config.file_output {
        let log_dir = get_log_directory(config)?;
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {log_dir:?}"))?;

        let file_appender = rolling::never(&log_dir, &config.file_name);
        let (file_writer, file_guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard store is poisoned"))?
            .push(file_guard);

        let layer = if config.json_format {
            fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .boxed()
        } else {
            fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_target(false)
                .with_ansi(false)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    // stdout is reserved for reports
    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_target(false)
    });

    Registry::default()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;

    tracing::info!(
        "Logging initialized (level: {}, console: {}, file: {})",
        config.level,
        config.console_output,
        config.file_output
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_no_output_is_rejected() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging_with_config(&config).is_err());
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            level: "domain_sales_tracker=loud".to_string(),
            ..LoggingConfig::default()
        };
        assert!(build_env_filter(&config).is_err());
    }

    #[test]
    fn test_configured_log_dir_wins() {
        let config = LoggingConfig {
            log_dir: Some(PathBuf::from("/tmp/tracker-logs")),
            ..LoggingConfig::default()
        };
        assert_eq!(
            get_log_directory(&config).unwrap(),
            PathBuf::from("/tmp/tracker-logs")
        );
    }

    #[test]
    fn test_file_logging_creates_log_file() {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            console_output: false,
            file_output: true,
            json_format: true,
            log_dir: Some(dir.path().to_path_buf()),
            ..LoggingConfig::default()
        };

        init_logging_with_config(&config).unwrap();
        assert!(dir.path().join(&config.file_name).exists());

        // a second global subscriber is refused
        assert!(init_logging_with_config(&config).is_err());
    }
}
