//! Configuration validation utilities

use super::*;
use crate::core::error::{Error, Result};
use crate::temporal::Aggregation;
use std::str::FromStr;

/// Accepted plot edge length, in pixels
const PLOT_SIZE_RANGE: std::ops::RangeInclusive<u32> = 200..=4000;

/// Validate the entire configuration
pub fn validate_config(config: &EdaConfig) -> Result<()> {
    validate_store_config(&config.store)?;
    validate_analysis_config(&config.analysis)?;
    validate_plot_config(&config.plot)?;
    validate_logging_config(&config.logging)?;

    Ok(())
}

/// Validate store configuration
pub fn validate_store_config(config: &StoreConfig) -> Result<()> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(Error::ConfigurationError(
            "store.data_dir must not be empty".to_string(),
        ));
    }
    if config.max_upload_mb == 0 {
        return Err(Error::ConfigurationError(
            "store.max_upload_mb must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Validate analysis defaults
pub fn validate_analysis_config(config: &AnalysisConfig) -> Result<()> {
    if config.value_counts_top_n == 0 {
        return Err(Error::ConfigurationError(
            "analysis.value_counts_top_n must be greater than 0".to_string(),
        ));
    }
    if config.preview_rows == 0 {
        return Err(Error::ConfigurationError(
            "analysis.preview_rows must be greater than 0".to_string(),
        ));
    }
    Aggregation::from_str(&config.default_aggregation).map_err(|_| {
        Error::ConfigurationError(format!(
            "Unknown default aggregation: {}",
            config.default_aggregation
        ))
    })?;
    Ok(())
}

/// Validate plot size
pub fn validate_plot_config(config: &PlotConfig) -> Result<()> {
    for (name, value) in [("width", config.width), ("height", config.height)] {
        if !PLOT_SIZE_RANGE.contains(&value) {
            return Err(Error::ConfigurationError(format!(
                "plot.{} must be between {} and {}, got {}",
                name,
                PLOT_SIZE_RANGE.start(),
                PLOT_SIZE_RANGE.end(),
                value
            )));
        }
    }
    Ok(())
}

/// Validate logging configuration.
///
/// Plain levels are checked; `env_logger` filter expressions are passed through.
pub fn validate_logging_config(config: &LoggingConfig) -> Result<()> {
    let level = config.level.trim();
    if level.is_empty() {
        return Err(Error::ConfigurationError(
            "logging.level must not be empty".to_string(),
        ));
    }
    let is_filter = level.contains('=') || level.contains(',');
    if !is_filter && log::LevelFilter::from_str(level).is_err() {
        return Err(Error::ConfigurationError(format!(
            "Invalid log level: {}",
            level
        )));
    }
    Ok(())
}
