//! Configuration loading utilities
//!
//! This module handles loading configuration from various sources with proper
//! precedence and validation.

use super::*;
use crate::core::error::{Error, Result};
use std::env;
use std::fs;
use std::path::Path;

/// Environment variable naming the configuration file
pub const CONFIG_FILE_ENV: &str = "TSEDA_CONFIG_FILE";

/// Load configuration from environment variables
pub fn load_from_env() -> Result<EdaConfig> {
    let mut config = EdaConfig::default();
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Overwrite the fields of `config` that have an environment variable set
fn apply_env_overrides(config: &mut EdaConfig) -> Result<()> {
    // Store configuration
    if let Ok(dir) = env::var("TSEDA_DATA_DIR") {
        config.store.data_dir = dir.into();
    }

    if let Ok(limit) = env::var("TSEDA_MAX_UPLOAD_MB") {
        config.store.max_upload_mb = limit.parse().map_err(|e| {
            Error::ConfigurationError(format!("Invalid TSEDA_MAX_UPLOAD_MB: {}", e))
        })?;
    }

    // Analysis defaults
    if let Ok(top_n) = env::var("TSEDA_TOP_N") {
        config.analysis.value_counts_top_n = top_n
            .parse()
            .map_err(|e| Error::ConfigurationError(format!("Invalid TSEDA_TOP_N: {}", e)))?;
    }

    if let Ok(rows) = env::var("TSEDA_PREVIEW_ROWS") {
        config.analysis.preview_rows = rows.parse().map_err(|e| {
            Error::ConfigurationError(format!("Invalid TSEDA_PREVIEW_ROWS: {}", e))
        })?;
    }

    if let Ok(agg) = env::var("TSEDA_DEFAULT_AGG") {
        config.analysis.default_aggregation = agg;
    }

    // Logging configuration
    if let Ok(level) = env::var("TSEDA_LOG_LEVEL").or_else(|_| env::var("RUST_LOG")) {
        config.logging.level = level;
    }

    Ok(())
}

/// Load configuration from a file (YAML or TOML based on extension)
pub fn load_from_file(path: &Path) -> Result<EdaConfig> {
    if !path.exists() {
        return Err(Error::ConfigurationError(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        Error::ConfigurationError(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => load_from_yaml(&contents),
        Some("toml") => load_from_toml(&contents),
        Some(ext) => Err(Error::ConfigurationError(format!(
            "Unsupported config file format: {}",
            ext
        ))),
        None => {
            // Try to parse as YAML first, then TOML
            load_from_yaml(&contents).or_else(|_| load_from_toml(&contents))
        }
    }
}

/// Load configuration from YAML string
pub fn load_from_yaml(yaml: &str) -> Result<EdaConfig> {
    serde_yaml::from_str(yaml)
        .map_err(|e| Error::ConfigurationError(format!("Failed to parse YAML config: {}", e)))
}

/// Load configuration from TOML string
pub fn load_from_toml(toml: &str) -> Result<EdaConfig> {
    toml::from_str(toml)
        .map_err(|e| Error::ConfigurationError(format!("Failed to parse TOML config: {}", e)))
}

/// Load configuration with precedence: defaults -> file -> environment
///
/// When no file is given, `TSEDA_CONFIG_FILE` is consulted.
pub fn load_with_precedence<P: AsRef<Path>>(config_file: Option<P>) -> Result<EdaConfig> {
    // Start with defaults; a file replaces every field it names
    let mut config = match config_file {
        Some(file_path) => load_from_file(file_path.as_ref())?,
        None => match env::var(CONFIG_FILE_ENV) {
            Ok(path) => load_from_file(Path::new(&path))?,
            Err(_) => EdaConfig::default(),
        },
    };

    // Environment has the highest precedence
    apply_env_overrides(&mut config)?;

    config.validate()?;

    log::debug!("loaded configuration: {:?}", config);
    Ok(config)
}

/// Save configuration to a file
pub fn save_to_file(config: &EdaConfig, path: &Path) -> Result<()> {
    let contents = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => config.to_yaml()?,
        Some("toml") => config.to_toml()?,
        Some(ext) => {
            return Err(Error::ConfigurationError(format!(
                "Unsupported config file format: {}",
                ext
            )))
        }
        None => config.to_yaml()?,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    fs::write(path, contents).map_err(|e| {
        Error::ConfigurationError(format!(
            "Failed to write config file {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // Mutex to serialize tests that modify environment variables
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 8] = [
        "TSEDA_DATA_DIR",
        "TSEDA_MAX_UPLOAD_MB",
        "TSEDA_TOP_N",
        "TSEDA_PREVIEW_ROWS",
        "TSEDA_DEFAULT_AGG",
        "TSEDA_LOG_LEVEL",
        "RUST_LOG",
        CONFIG_FILE_ENV,
    ];

    /// Clear the variables, run `f`, then restore the previous values
    fn with_clean_env<F: FnOnce()>(f: F) {
        let _lock = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let saved: Vec<(&str, Option<String>)> =
            VARS.iter().map(|v| (*v, env::var(v).ok())).collect();
        for var in VARS {
            env::remove_var(var);
        }

        f();

        for (var, value) in saved {
            match value {
                Some(v) => env::set_var(var, v),
                None => env::remove_var(var),
            }
        }
    }

    #[test]
    fn test_load_from_env() {
        with_clean_env(|| {
            env::set_var("TSEDA_DATA_DIR", "/tmp/datasets");
            env::set_var("TSEDA_TOP_N", "3");
            env::set_var("TSEDA_DEFAULT_AGG", "sum");
            env::set_var("RUST_LOG", "debug");

            let config = load_from_env().unwrap();
            assert_eq!(config.store.data_dir, Path::new("/tmp/datasets"));
            assert_eq!(config.analysis.value_counts_top_n, 3);
            assert_eq!(config.analysis.default_aggregation, "sum");
            assert_eq!(config.logging.level, "debug");
            assert_eq!(config.analysis.preview_rows, 5);
        });
    }

    #[test]
    fn test_invalid_env_number() {
        with_clean_env(|| {
            env::set_var("TSEDA_PREVIEW_ROWS", "many");
            assert!(matches!(
                load_from_env(),
                Err(Error::ConfigurationError(_))
            ));
        });
    }

    #[test]
    fn test_load_from_yaml_partial() {
        let yaml = r#"
analysis:
  preview_rows: 12
plot:
  width: 640
"#;
        let config = load_from_yaml(yaml).unwrap();
        assert_eq!(config.analysis.preview_rows, 12);
        assert_eq!(config.analysis.value_counts_top_n, 10);
        assert_eq!(config.plot.width, 640);
        assert_eq!(config.plot.height, 800);
    }

    #[test]
    fn test_load_from_toml() {
        let toml = r#"
[store]
max_upload_mb = 25

[logging]
level = "warn"
"#;
        let config = load_from_toml(toml).unwrap();
        assert_eq!(config.store.max_upload_mb, 25);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempdir().unwrap();
        let mut original = EdaConfig::default();
        original.analysis.default_aggregation = "median".to_string();

        for name in ["config.yml", "config.toml"] {
            let path = dir.path().join(name);
            save_to_file(&original, &path).unwrap();
            assert_eq!(load_from_file(&path).unwrap(), original);
        }

        assert!(save_to_file(&original, &dir.path().join("config.ini")).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(load_from_file(&dir.path().join("absent.yml")).is_err());
    }

    #[test]
    fn test_precedence() {
        with_clean_env(|| {
            let dir = tempdir().unwrap();
            let path = dir.path().join("tseda.yml");
            fs::write(
                &path,
                "analysis:\n  preview_rows: 8\n  value_counts_top_n: 4\n",
            )
            .unwrap();

            env::set_var("TSEDA_TOP_N", "6");

            let config = load_with_precedence(Some(&path)).unwrap();
            assert_eq!(config.analysis.preview_rows, 8);
            assert_eq!(config.analysis.value_counts_top_n, 6);
        });
    }

    #[test]
    fn test_precedence_rejects_invalid_result() {
        with_clean_env(|| {
            env::set_var("TSEDA_DEFAULT_AGG", "mode");
            assert!(load_with_precedence::<&Path>(None).is_err());
        });
    }
}
