use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::metrics::{
    PersistencePolicy, DEFAULT_DOCUMENT_WINDOW_CAPACITY, DEFAULT_JOB_WINDOW_CAPACITY,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Returns the canonical data directory: `~/.docusearch`.
///
/// Falls back to a relative `.docusearch` when no home directory is known.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".docusearch"))
        .unwrap_or_else(|| PathBuf::from(".docusearch"))
}

impl Config {
    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            storage: StorageConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.data_dir.join(&self.storage.metadata_dir)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join(&self.storage.results_dir)
    }

    pub fn parsed_documents_dir(&self) -> PathBuf {
        self.data_dir.join(&self.storage.parsed_documents_dir)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.metrics_file)
    }

    pub fn persistence_policy(&self) -> PersistencePolicy {
        match self.metrics.debounce_ms {
            0 => PersistencePolicy::EveryMutation,
            ms => PersistencePolicy::Debounced {
                interval: Duration::from_millis(ms),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

/// Locations of the on-disk artifacts, relative to `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: String,
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    #[serde(default = "default_parsed_documents_dir")]
    pub parsed_documents_dir: String,
    #[serde(default = "default_metrics_file")]
    pub metrics_file: String,
}

fn default_metadata_dir() -> String {
    "job_metadata".to_string()
}

fn default_results_dir() -> String {
    "job_results".to_string()
}

fn default_parsed_documents_dir() -> String {
    "parsed_documents".to_string()
}

fn default_metrics_file() -> String {
    "metrics.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            metadata_dir: default_metadata_dir(),
            results_dir: default_results_dir(),
            parsed_documents_dir: default_parsed_documents_dir(),
            metrics_file: default_metrics_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_job_window_capacity")]
    pub job_window_capacity: usize,
    #[serde(default = "default_document_window_capacity")]
    pub document_window_capacity: usize,
    /// Minimum delay between metrics snapshot writes. `0` writes after every
    /// mutation.
    #[serde(default)]
    pub debounce_ms: u64,
}

fn default_job_window_capacity() -> usize {
    DEFAULT_JOB_WINDOW_CAPACITY
}

fn default_document_window_capacity() -> usize {
    DEFAULT_DOCUMENT_WINDOW_CAPACITY
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            job_window_capacity: default_job_window_capacity(),
            document_window_capacity: default_document_window_capacity(),
            debounce_ms: 0,
        }
    }
}
