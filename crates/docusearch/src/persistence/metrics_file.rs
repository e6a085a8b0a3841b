//! The metrics snapshot document (`metrics.json`).

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::metrics::{DocumentCounters, JobCounters};

/// Persisted form of the metrics store. Every field is optional on load so
/// older or partial documents still restore what they carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsDocument {
    #[serde(default)]
    pub collection_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub jobs: JobCounters,
    #[serde(default, alias = "document_metrics")]
    pub documents: DocumentCounters,
    #[serde(default)]
    pub job_latencies: Vec<f64>,
    #[serde(default, alias = "document_processing_times")]
    pub document_latencies: Vec<f64>,
}

pub fn load(path: &Path) -> Result<Option<MetricsDocument>, StorageError> {
    super::read_json(path)
}

pub fn save(path: &Path, document: &MetricsDocument) -> Result<(), StorageError> {
    super::write_json_atomic(path, document)
}
