//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, SporError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub storage: StorageConfig,
    pub recording: RecordingConfig,
    pub recovery: RecoveryConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: String,
}

/// Recording configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecordingConfig {
    /// Sync the track log every N samples, 0 = only when stopping
    #[serde(default = "default_sync_interval")]
    pub sync_interval: u32,

    /// Accept a fix once this much time has passed since the last one
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Accept a fix once it is this far from the last one
    #[serde(default = "default_min_distance_m")]
    pub min_distance_m: f64,
}

/// Startup recovery configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecoveryConfig {
    #[serde(default = "default_recovery_enabled")]
    pub enabled: bool,

    /// Keep an orphaned log whose export failed instead of deleting it
    #[serde(default = "default_keep_failed_logs")]
    pub keep_failed_logs: bool,
}

/// GPX export configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_creator")]
    pub creator: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Empty = stdout, otherwise daily rotated files in this directory
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_storage_dir() -> String { "./spor".to_string() }

fn default_sync_interval() -> u32 { 1 }
fn default_min_interval_ms() -> u64 { 5000 }
fn default_min_distance_m() -> f64 { 5.0 }

fn default_recovery_enabled() -> bool { true }
fn default_keep_failed_logs() -> bool { true }

fn default_creator() -> String { crate::gpx::DEFAULT_CREATOR.to_string() }

fn default_log_level() -> String { "info".to_string() }

/// Longest accepted `min_interval_ms` (one hour)
const MAX_MIN_INTERVAL_MS: u64 = 3_600_000;

impl Default for StorageConfig {
    fn default() -> Self {
        Self { dir: default_storage_dir() }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            sync_interval: default_sync_interval(),
            min_interval_ms: default_min_interval_ms(),
            min_distance_m: default_min_distance_m(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_recovery_enabled(),
            keep_failed_logs: default_keep_failed_logs(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { creator: default_creator() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use spor::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.storage.dir.is_empty() {
            return Err(SporError::Config(
                toml::de::Error::custom("storage dir cannot be empty")
            ));
        }

        if !self.recording.min_distance_m.is_finite() || self.recording.min_distance_m < 0.0 {
            return Err(SporError::Config(
                toml::de::Error::custom("min_distance_m must be a non-negative number")
            ));
        }

        if self.recording.min_interval_ms > MAX_MIN_INTERVAL_MS {
            return Err(SporError::Config(
                toml::de::Error::custom("min_interval_ms must be between 0 and 3600000")
            ));
        }

        if self.export.creator.is_empty() {
            return Err(SporError::Config(
                toml::de::Error::custom("export creator cannot be empty")
            ));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(SporError::Config(
                toml::de::Error::custom(format!(
                    "log level '{}' must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ))
            ));
        }

        Ok(())
    }
}
