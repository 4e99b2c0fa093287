//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/feedpulse/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/feedpulse/` (~/.config/feedpulse/)
//! - Data: `$XDG_DATA_HOME/feedpulse/` (~/.local/share/feedpulse/)
//! - State/Logs: `$XDG_STATE_HOME/feedpulse/` (~/.local/state/feedpulse/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Metric collection tuning
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Retention policy for stored metric points
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where organization exports are read from
    #[serde(default)]
    pub source: SourceConfig,
}

/// Collection job configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    /// Most recent submissions considered per organization
    #[serde(default = "default_submission_limit")]
    pub submission_limit: usize,

    /// Rows per insert batch when replacing an organization's metrics
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            submission_limit: default_submission_limit(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_submission_limit() -> usize {
    1000
}

fn default_batch_size() -> usize {
    500
}

/// Retention configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    /// Points whose bucket is older than this many days are deleted by cleanup
    #[serde(default = "default_retention_days")]
    pub days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    365
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,

    /// Mirror warnings and errors to stderr
    #[serde(default)]
    pub stderr: bool,

    /// Log directory (default: the XDG state directory)
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
            stderr: false,
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Feedback export source
#[derive(Debug, Deserialize, Default, Clone)]
pub struct SourceConfig {
    /// Directory holding `*.json` organization exports
    pub export_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.collection.submission_limit == 0 {
            return Err(Error::Config(
                "collection.submission_limit must be at least 1".to_string(),
            ));
        }
        if self.collection.batch_size == 0 {
            return Err(Error::Config(
                "collection.batch_size must be at least 1".to_string(),
            ));
        }
        crate::logging::filter_directives(&self.logging.level)?;
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/feedpulse/config.toml` (~/.config/feedpulse/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("feedpulse").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("feedpulse")
    }

    /// Returns the state directory path (for logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("feedpulse")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/feedpulse/metrics.db` (~/.local/share/feedpulse/metrics.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("metrics.db")
    }

    /// Returns the configured export directory, or `<data_dir>/exports`
    pub fn export_dir(&self) -> PathBuf {
        self.source
            .export_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("exports"))
    }
}
