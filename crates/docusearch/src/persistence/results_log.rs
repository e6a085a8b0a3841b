//! Append-friendly per-job results logs
//! (`<results_dir>/job_<job_id>_results.jsonl`).
//!
//! The first line is a [`ResultsHeader`]; every following line is one
//! [`FileResult`] in arrival order.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;
use crate::jobs::record::{DataSource, FileResult, JobRecord, JobStatus, SkipReasons};
use crate::persistence::recovery::{decode_result, PartialJobRecord};

const FILE_PREFIX: &str = "job_";
const FILE_SUFFIX: &str = "_results.jsonl";

/// Summary line at the top of a results log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultsHeader {
    pub job_id: String,
    pub status: JobStatus,
    pub total_files: u64,
    pub processed_files: u64,
    pub successful_files: u64,
    pub failed_files: u64,
    pub skipped_files: u64,
    pub skipped_reasons: SkipReasons,
    pub corrupt_files: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub processing_time_seconds: f64,
    pub metadata_options: Vec<String>,
    pub data_source: DataSource,
}

impl ResultsHeader {
    pub fn from_record(record: &JobRecord) -> Self {
        Self {
            job_id: record.id.clone(),
            status: record.status,
            total_files: record.total_files,
            processed_files: record.processed_files,
            successful_files: record.successful_files,
            failed_files: record.failed_files,
            skipped_files: record.skipped_files,
            skipped_reasons: record.skip_reasons,
            corrupt_files: record.corrupt_files,
            start_time: record.start_time,
            end_time: record.end_time,
            processing_time_seconds: record.processing_time_seconds(),
            metadata_options: record.metadata_options.clone(),
            data_source: record.data_source.clone(),
        }
    }
}

/// A results log read back from disk.
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    pub header: Option<PartialJobRecord>,
    pub results: Vec<FileResult>,
    /// Lines that could not be decoded, e.g. a write cut short by a crash.
    pub skipped_lines: usize,
}

/// Results logs stored in one directory.
#[derive(Debug, Clone)]
pub struct ResultsLog {
    dir: PathBuf,
}

impl ResultsLog {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, job_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", FILE_PREFIX, job_id, FILE_SUFFIX))
    }

    /// Starts a log containing only the header.
    pub fn create(&self, record: &JobRecord) -> Result<(), StorageError> {
        let path = self.path(&record.id);
        let mut content = encode_line(&path, &ResultsHeader::from_record(record))?;
        content.push('\n');
        super::write_atomic(&path, content.as_bytes())
    }

    /// Appends one result line. Fails with `WriteFile` if the log does not
    /// exist yet; callers then [`rewrite`](Self::rewrite) it.
    pub fn append(&self, job_id: &str, result: &FileResult) -> Result<(), StorageError> {
        let path = self.path(job_id);
        let mut line = encode_line(&path, result)?;
        line.push('\n');

        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|e| StorageError::WriteFile { path, source: e })
    }

    /// Replaces the whole log with the record's current header and results.
    pub fn rewrite(&self, record: &JobRecord) -> Result<(), StorageError> {
        let path = self.path(&record.id);
        let mut content = encode_line(&path, &ResultsHeader::from_record(record))?;
        content.push('\n');
        for result in &record.results {
            content.push_str(&encode_line(&path, result)?);
            content.push('\n');
        }
        super::write_atomic(&path, content.as_bytes())
    }

    /// The raw log text, `None` if there is no log.
    pub fn read_raw(&self, job_id: &str) -> Result<Option<String>, StorageError> {
        let path = self.path(job_id);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFile { path, source: e }),
        }
    }

    pub fn read(&self, job_id: &str) -> Result<Option<ParsedLog>, StorageError> {
        Ok(self.read_raw(job_id)?.map(|content| parse_log(&content)))
    }

    pub fn remove(&self, job_id: &str) -> Result<bool, StorageError> {
        super::remove_if_exists(&self.path(job_id))
    }

    /// Job ids that have a log in this directory.
    pub fn job_ids(&self) -> Result<Vec<String>, StorageError> {
        Ok(super::list_files(&self.dir, "jsonl")?
            .iter()
            .filter_map(|path| path.file_name())
            .filter_map(|name| job_id_from_file_name(&name.to_string_lossy()))
            .collect())
    }
}

fn encode_line<T: Serialize>(path: &Path, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Encode {
        path: path.to_path_buf(),
        source: e,
    })
}

fn job_id_from_file_name(name: &str) -> Option<String> {
    let id = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

fn is_header(value: &Value) -> bool {
    value.get("job_id").is_some() && value.get("filename").is_none()
}

/// Splits log text into header and results, dropping undecodable lines.
pub fn parse_log(content: &str) -> ParsedLog {
    let mut parsed = ParsedLog::default();
    let mut lines = content.lines().filter(|line| !line.trim().is_empty()).peekable();

    if let Some(first) = lines.peek() {
        if let Ok(value) = serde_json::from_str::<Value>(first) {
            if is_header(&value) {
                parsed.header = serde_json::from_value(value).ok();
                lines.next();
            }
        }
    }

    let fallback = parsed
        .header
        .as_ref()
        .and_then(|h| h.start_time)
        .unwrap_or_else(Utc::now);

    for line in lines {
        let decoded = serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|value| decode_result(value, fallback));
        match decoded {
            Some(result) => parsed.results.push(result),
            None => parsed.skipped_lines += 1,
        }
    }

    parsed
}
