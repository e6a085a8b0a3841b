use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

pub const ENV_DATA_DIR: &str = "DOCUSEARCH_DATA_DIR";
pub const ENV_METRICS_DEBOUNCE_MS: &str = "DOCUSEARCH_METRICS_DEBOUNCE_MS";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = serde_json::from_str(content)?;

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Builds the configuration used when no config file is given: defaults plus
/// environment overrides.
pub fn config_from_env() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Applies `DOCUSEARCH_*` environment variables on top of `config`.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        if !dir.trim().is_empty() {
            config.data_dir = PathBuf::from(dir);
        }
    }

    if let Ok(raw) = std::env::var(ENV_METRICS_DEBOUNCE_MS) {
        config.metrics.debounce_ms =
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    name: ENV_METRICS_DEBOUNCE_MS.to_string(),
                    value: raw.clone(),
                })?;
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.metrics.job_window_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "metrics.job_window_capacity must be greater than zero".to_string(),
        });
    }
    if config.metrics.document_window_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "metrics.document_window_capacity must be greater than zero".to_string(),
        });
    }

    let storage = &config.storage;
    let names = [
        ("storage.metadata_dir", &storage.metadata_dir),
        ("storage.results_dir", &storage.results_dir),
        ("storage.parsed_documents_dir", &storage.parsed_documents_dir),
        ("storage.metrics_file", &storage.metrics_file),
    ];
    for (field, value) in names {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("{} must not be empty", field),
            });
        }
    }

    if storage.metadata_dir == storage.results_dir {
        return Err(ConfigError::Validation {
            message: "storage.metadata_dir and storage.results_dir must differ".to_string(),
        });
    }

    Ok(())
}
