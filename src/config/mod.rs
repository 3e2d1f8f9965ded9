//! Configuration management for tseda
//!
//! This module provides centralized configuration management with support for:
//! - Environment variables
//! - YAML/TOML configuration files
//! - Configuration validation

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod loader;
pub mod validation;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EdaConfig {
    /// Dataset storage settings
    pub store: StoreConfig,
    /// Defaults for analysis calls
    pub analysis: AnalysisConfig,
    /// Chart rendering settings
    pub plot: PlotConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Dataset storage section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding saved datasets
    pub data_dir: PathBuf,
    /// Largest accepted upload, in megabytes
    pub max_upload_mb: u64,
}

/// Analysis defaults section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Entries returned by value counts when the caller gives no limit
    pub value_counts_top_n: usize,
    /// Records returned by a resample preview when the caller gives no limit
    pub preview_rows: usize,
    /// Aggregation used by a resample preview when the caller names none
    pub default_aggregation: String,
}

/// Chart section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Image width (pixels)
    pub width: u32,
    /// Image height (pixels)
    pub height: u32,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level, or an `env_logger` filter such as `tseda=debug`
    pub level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_upload_mb: 10,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            value_counts_top_n: 10,
            preview_rows: 5,
            default_aggregation: "mean".to_string(),
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 800,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl EdaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        loader::load_from_env()
    }

    /// Load configuration from a file (YAML or TOML)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        loader::load_from_file(path.as_ref())
    }

    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        loader::load_from_yaml(yaml)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml: &str) -> Result<Self> {
        loader::load_from_toml(toml)
    }

    /// Load configuration with precedence: defaults -> file -> env
    pub fn load_with_precedence<P: AsRef<Path>>(config_file: Option<P>) -> Result<Self> {
        loader::load_with_precedence(config_file)
    }

    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            Error::ConfigurationError(format!("Failed to serialize config to YAML: {}", e))
        })
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| {
            Error::ConfigurationError(format!("Failed to serialize config to TOML: {}", e))
        })
    }

    /// Merge another configuration into this one.
    ///
    /// Values in `other` that differ from the defaults win.
    pub fn merge(&mut self, other: &Self) {
        let defaults = EdaConfig::default();

        if other.store.data_dir != defaults.store.data_dir {
            self.store.data_dir = other.store.data_dir.clone();
        }
        if other.store.max_upload_mb != defaults.store.max_upload_mb {
            self.store.max_upload_mb = other.store.max_upload_mb;
        }

        if other.analysis.value_counts_top_n != defaults.analysis.value_counts_top_n {
            self.analysis.value_counts_top_n = other.analysis.value_counts_top_n;
        }
        if other.analysis.preview_rows != defaults.analysis.preview_rows {
            self.analysis.preview_rows = other.analysis.preview_rows;
        }
        if other.analysis.default_aggregation != defaults.analysis.default_aggregation {
            self.analysis.default_aggregation = other.analysis.default_aggregation.clone();
        }

        if other.plot.width != defaults.plot.width {
            self.plot.width = other.plot.width;
        }
        if other.plot.height != defaults.plot.height {
            self.plot.height = other.plot.height;
        }

        if other.logging.level != defaults.logging.level {
            self.logging.level = other.logging.level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EdaConfig::default();
        assert_eq!(config.store.data_dir, PathBuf::from("data"));
        assert_eq!(config.store.max_upload_mb, 10);
        assert_eq!(config.analysis.value_counts_top_n, 10);
        assert_eq!(config.analysis.preview_rows, 5);
        assert_eq!(config.analysis.default_aggregation, "mean");
        assert_eq!((config.plot.width, config.plot.height), (1000, 800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_keeps_non_default_values() {
        let mut base = EdaConfig::default();
        base.analysis.preview_rows = 20;

        let mut other = EdaConfig::default();
        other.plot.width = 640;

        base.merge(&other);
        assert_eq!(base.analysis.preview_rows, 20);
        assert_eq!(base.plot.width, 640);
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = EdaConfig::default();
        config.logging.level = "debug".to_string();
        let yaml = config.to_yaml().unwrap();
        assert_eq!(EdaConfig::from_yaml(&yaml).unwrap(), config);
    }
}
