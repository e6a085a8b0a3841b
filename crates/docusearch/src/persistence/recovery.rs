//! Tolerant decoding of persisted job documents.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::jobs::record::{DataSource, FileResult, JobRecord, JobStatus, SkipReasons};

/// A job document as found on disk: every field optional, wrongly typed
/// fields treated as absent.
///
/// Decodes both metadata documents and results-log headers. Defaults applied
/// by [`PartialJobRecord::into_record`]:
/// - `status`: `Unknown` when missing or unrecognised
/// - counters: 0; `processed_files` is recomputed from its parts
/// - `total_files`: at least `processed_files`
/// - `start_time`: `end_time`, or now
/// - `data_source`: `Local`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialJobRecord {
    #[serde(default, alias = "job_id", deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_files: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub processed_files: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub successful_files: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub failed_files: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub skipped_files: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub corrupt_files: Option<u64>,
    #[serde(default, alias = "skip_reasons", deserialize_with = "lenient")]
    pub skipped_reasons: Option<SkipReasons>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub current_file: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub metadata_options: Option<Vec<String>>,
    #[serde(default)]
    pub data_source: Option<Value>,
    #[serde(default)]
    pub results: Option<Vec<Value>>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_timestamp))
}

/// Parses RFC 3339, or a naive ISO 8601 timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Decodes one persisted file result. A missing or naive timestamp is
/// repaired with `fallback` or read as UTC.
pub fn decode_result(mut value: Value, fallback: DateTime<Utc>) -> Option<FileResult> {
    let obj = value.as_object_mut()?;
    obj.get("filename")?.as_str()?;

    let timestamp = obj
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or(fallback);
    obj.insert(
        "timestamp".to_string(),
        Value::String(timestamp.to_rfc3339()),
    );
    if !obj.get("success").is_some_and(Value::is_boolean) {
        obj.insert("success".to_string(), Value::Bool(false));
    }

    serde_json::from_value(value).ok()
}

/// Accepts both the tagged form and the legacy string form.
pub fn decode_data_source(value: Option<&Value>) -> DataSource {
    match value {
        Some(Value::String(s)) => DataSource::parse_legacy(s).unwrap_or_default(),
        Some(other @ Value::Object(_)) => {
            serde_json::from_value(other.clone()).unwrap_or_default()
        }
        _ => DataSource::default(),
    }
}

impl PartialJobRecord {
    /// Builds a consistent record, naming it `fallback_id` when the document
    /// carries no id of its own.
    pub fn into_record(self, fallback_id: &str) -> JobRecord {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| fallback_id.to_string());
        let status = self
            .status
            .as_deref()
            .and_then(JobStatus::parse)
            .unwrap_or(JobStatus::Unknown);

        let successful = self.successful_files.unwrap_or(0);
        let failed = self.failed_files.unwrap_or(0);
        let skipped = self.skipped_files.unwrap_or(0);
        let processed = successful.saturating_add(failed).saturating_add(skipped);
        if let Some(stored) = self.processed_files {
            if stored != processed {
                log::warn!(
                    "Job {} stored processed_files={} but its counters sum to {}, using {}",
                    id,
                    stored,
                    processed,
                    processed
                );
            }
        }
        let total = self.total_files.unwrap_or(processed).max(processed);

        let start_time = self
            .start_time
            .or(self.end_time)
            .unwrap_or_else(Utc::now);
        let end_time = self.end_time.map(|end| end.max(start_time));

        let results = self
            .results
            .unwrap_or_default()
            .into_iter()
            .filter_map(|value| decode_result(value, start_time))
            .collect();

        JobRecord {
            id,
            status,
            total_files: total,
            processed_files: processed,
            successful_files: successful,
            failed_files: failed,
            skipped_files: skipped,
            corrupt_files: self.corrupt_files.unwrap_or(0).min(failed),
            skip_reasons: self.skipped_reasons.unwrap_or_default(),
            start_time,
            end_time,
            current_file: self.current_file,
            metadata_options: self.metadata_options.unwrap_or_default(),
            data_source: decode_data_source(self.data_source.as_ref()),
            results,
        }
    }
}
