//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate:
//! 1. Built-in defaults (the `defaults` module below)
//! 2. Config file (TOML or JSON, by extension)
//! 3. Environment variables, e.g. `DOMAIN_TRACKER_SCAN__REQUEST_DELAY_MS=500`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::domain::{ResultOrder, ThresholdPolicy};
use crate::infrastructure::page_fetcher::FetcherConfig;
use crate::infrastructure::parsing::CardSelectors;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub fetcher: FetcherConfig,
    pub selectors: CardSelectors,
    pub partners: PartnersConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
}

/// Pacing and classification of a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Minimum pause between two partner fetches
    pub request_delay_ms: u64,
    /// Random extra pause added on top of the delay
    pub request_jitter_ms: u64,
    pub high_threshold_pct: f64,
    pub medium_threshold_pct: f64,
    pub result_order: ResultOrder,
    /// Poll interval of the live progress view
    pub progress_tick_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: defaults::REQUEST_DELAY_MS,
            request_jitter_ms: defaults::REQUEST_JITTER_MS,
            high_threshold_pct: defaults::HIGH_THRESHOLD_PCT,
            medium_threshold_pct: defaults::MEDIUM_THRESHOLD_PCT,
            result_order: ResultOrder::Input,
            progress_tick_ms: defaults::PROGRESS_TICK_MS,
        }
    }
}

impl ScanConfig {
    pub fn threshold_policy(&self) -> ThresholdPolicy {
        ThresholdPolicy {
            high_pct: self.high_threshold_pct,
            medium_pct: self.medium_threshold_pct,
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_jitter(&self) -> Duration {
        Duration::from_millis(self.request_jitter_ms)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }
}

/// Where the partner list comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnersConfig {
    /// Explicit partner URLs (all treated as launched)
    pub urls: Vec<String>,
    /// `URL[,status]` text file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Published spreadsheet CSV export with `URL,Status` columns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_csv_url: Option<String>,
    pub include_not_launched: bool,
    pub sort_alphabetically: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Defaults to `<data dir>/domain-sales-tracker/logs`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
        }
    }
}

/// Report output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// Also write the `pages_without_domains_<ts>.txt` review list
    pub write_no_domains_list: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(defaults::OUTPUT_DIR),
            write_no_domains_list: true,
        }
    }
}

impl AppConfig {
    /// Defaults, then `path` (required when given), then environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scan
            .threshold_policy()
            .validate()
            .map_err(|e| ConfigError::validation(e.to_string()))?;

        if self.scan.progress_tick_ms == 0 {
            return Err(ConfigError::validation("progress_tick_ms must be greater than 0"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(ConfigError::validation("fetcher timeout_secs must be greater than 0"));
        }
        if self.fetcher.max_requests_per_second == 0 {
            return Err(ConfigError::validation(
                "fetcher max_requests_per_second must be greater than 0",
            ));
        }

        self.selectors
            .validate()
            .map_err(|e| ConfigError::validation(e.to_string()))?;

        if !self.logging.console_output && !self.logging.file_output {
            return Err(ConfigError::validation(
                "logging needs console_output or file_output enabled",
            ));
        }
        if self.output.directory.as_os_str().is_empty() {
            return Err(ConfigError::validation("output directory must not be empty"));
        }

        Ok(())
    }
}

/// Locates and writes the user config file
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// `<config dir>/domain-sales-tracker`
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(config_dir)
    }

    /// `<data dir>/domain-sales-tracker`
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(data_dir)
    }

    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load from the managed file when it exists, otherwise defaults + environment
    pub fn load_config(&self) -> Result<AppConfig> {
        let path = self.config_path.exists().then_some(self.config_path.as_path());
        let config = AppConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", self.config_path))?;
        if path.is_some() {
            info!("Loaded configuration from: {:?}", self.config_path);
        }
        Ok(config)
    }

    /// Write `config` as TOML
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(dir) = self.config_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("Failed to create config directory {dir:?}"))?;
                info!("✅ Created configuration directory: {:?}", dir);
            }
        }

        let content =
            toml::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .with_context(|| format!("Failed to write configuration to {:?}", self.config_path))?;

        info!("Configuration saved to: {:?}", self.config_path);
        Ok(())
    }

    /// Write the default config. Refuses to overwrite unless `force` is set.
    pub async fn write_default(&self, force: bool) -> Result<AppConfig> {
        if self.config_path.exists() && !force {
            anyhow::bail!(
                "Configuration file already exists: {:?} (use --force to overwrite)",
                self.config_path
            );
        }
        let config = AppConfig::default();
        self.save_config(&config).await?;
        Ok(config)
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "domain-sales-tracker";
    pub const CONFIG_FILE_NAME: &str = "config.toml";
    pub const ENV_PREFIX: &str = "DOMAIN_TRACKER";

    /// Delay between partner requests in milliseconds
    pub const REQUEST_DELAY_MS: u64 = 1000;
    pub const REQUEST_JITTER_MS: u64 = 0;

    pub const HIGH_THRESHOLD_PCT: f64 = 90.0;
    pub const MEDIUM_THRESHOLD_PCT: f64 = 75.0;

    pub const PROGRESS_TICK_MS: u64 = 100;

    pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;
    pub const MAX_RETRIES: u32 = 2;
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;
    /// Upper bound for a server-supplied Retry-After
    pub const MAX_RETRY_AFTER_SECS: u64 = 30;
    pub const MAX_REDIRECTS: usize = 10;
    pub const CONTENT_MARKER: &str = "domain-card";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = false;
    pub const LOG_FILE_NAME: &str = "domain-sales-tracker.log";

    pub const OUTPUT_DIR: &str = "scan-results";
}
