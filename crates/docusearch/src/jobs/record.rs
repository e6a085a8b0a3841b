//! Job records: the state, counters and per-file results of one batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::DocumentOutcome;

/// Status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Recovered from disk without a recognisable status. Accepts no further
    /// transitions.
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Processing => "Processing",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
            JobStatus::Unknown => "Unknown",
        }
    }

    /// Parses a persisted status, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "unknown" => Some(JobStatus::Unknown),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Pending or Processing.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a file was skipped instead of processed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    #[serde(alias = "unknown_format")]
    UnsupportedFormat,
    #[serde(alias = "file_size_limit")]
    SizeLimit,
    PageLimit,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UnsupportedFormat => write!(f, "unsupported format"),
            SkipReason::SizeLimit => write!(f, "size limit"),
            SkipReason::PageLimit => write!(f, "page limit"),
        }
    }
}

/// Per-reason skip counters. The key set is fixed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkipReasons {
    #[serde(default, alias = "unknown_format")]
    pub unsupported_format: u64,
    #[serde(default, alias = "file_size_limit")]
    pub size_limit: u64,
    #[serde(default)]
    pub page_limit: u64,
}

impl SkipReasons {
    pub fn increment(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::UnsupportedFormat => {
                self.unsupported_format = self.unsupported_format.saturating_add(1);
            }
            SkipReason::SizeLimit => self.size_limit = self.size_limit.saturating_add(1),
            SkipReason::PageLimit => self.page_limit = self.page_limit.saturating_add(1),
        }
    }

    pub fn get(&self, reason: SkipReason) -> u64 {
        match reason {
            SkipReason::UnsupportedFormat => self.unsupported_format,
            SkipReason::SizeLimit => self.size_limit,
            SkipReason::PageLimit => self.page_limit,
        }
    }

    pub fn total(&self) -> u64 {
        self.unsupported_format
            .saturating_add(self.size_limit)
            .saturating_add(self.page_limit)
    }
}

/// Where the files of a batch came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    #[default]
    Local,
    Bucket {
        bucket: String,
        #[serde(default)]
        prefix: String,
    },
}

impl DataSource {
    /// Parses the short string form used by older metadata files
    /// (`"Local"`, `"s3://bucket/prefix"`).
    pub fn parse_legacy(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("local") {
            return Some(DataSource::Local);
        }
        let rest = trimmed.strip_prefix("s3://")?;
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return None;
        }
        Some(DataSource::Bucket {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Local => write!(f, "local"),
            DataSource::Bucket { bucket, prefix } if prefix.is_empty() => {
                write!(f, "s3://{}", bucket)
            }
            DataSource::Bucket { bucket, prefix } => write!(f, "s3://{}/{}", bucket, prefix),
        }
    }
}

/// Outcome of one file, as reported by the document-processing collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileResult {
    pub filename: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub skip_reason: Option<SkipReason>,
    /// Extracted metadata. Opaque to the job store.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Arrival time; restamped by the store when the result is recorded.
    pub timestamp: DateTime<Utc>,
    /// Time the collaborator spent on this file, if it measured it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl FileResult {
    pub fn success(filename: &str, metadata: Option<serde_json::Value>) -> Self {
        Self {
            filename: filename.to_string(),
            success: true,
            error: None,
            skip_reason: None,
            metadata,
            timestamp: Utc::now(),
            duration_seconds: None,
        }
    }

    pub fn failure(filename: &str, error: &str) -> Self {
        Self {
            filename: filename.to_string(),
            success: false,
            error: Some(error.to_string()),
            skip_reason: None,
            metadata: None,
            timestamp: Utc::now(),
            duration_seconds: None,
        }
    }

    pub fn skipped(filename: &str, reason: SkipReason, message: &str) -> Self {
        Self {
            filename: filename.to_string(),
            success: false,
            error: Some(message.to_string()),
            skip_reason: Some(reason),
            metadata: None,
            timestamp: Utc::now(),
            duration_seconds: None,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    /// A result is a success if flagged so, a skip if it carries a skip
    /// reason, and a failure otherwise.
    pub fn outcome(&self) -> DocumentOutcome {
        if self.success {
            DocumentOutcome::Success
        } else if self.skip_reason.is_some() {
            DocumentOutcome::Skipped
        } else {
            DocumentOutcome::Failed
        }
    }

    /// Whether the error text marks the file itself as unreadable.
    pub fn is_corrupt(&self) -> bool {
        if self.outcome() != DocumentOutcome::Failed {
            return false;
        }
        self.error.as_deref().is_some_and(|e| {
            let e = e.to_lowercase();
            e.contains("corrupt") || e.contains("not readable") || e.contains("not parsable")
        })
    }
}

/// Rejected state-machine transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("job is {status} and accepts no more file results")]
    NotAcceptingResults { status: JobStatus },

    #[error("all {total} files are already accounted for")]
    AllFilesAccounted { total: u64 },

    #[error("job is already {status}")]
    AlreadyFinal { status: JobStatus },

    #[error("{status} is not a terminal status")]
    NotTerminal { status: JobStatus },
}

/// Full state of one batch job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub total_files: u64,
    pub processed_files: u64,
    pub successful_files: u64,
    pub failed_files: u64,
    pub skipped_files: u64,
    /// Failed files whose error marks them as unreadable. Subset of
    /// `failed_files`.
    #[serde(default)]
    pub corrupt_files: u64,
    #[serde(rename = "skipped_reasons")]
    pub skip_reasons: SkipReasons,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub metadata_options: Vec<String>,
    #[serde(default)]
    pub data_source: DataSource,
    #[serde(default)]
    pub results: Vec<FileResult>,
}

impl JobRecord {
    /// Creates a Pending record started now.
    pub fn new(
        id: &str,
        total_files: u64,
        metadata_options: Vec<String>,
        data_source: DataSource,
    ) -> Self {
        Self {
            id: id.to_string(),
            status: JobStatus::Pending,
            total_files,
            processed_files: 0,
            successful_files: 0,
            failed_files: 0,
            skipped_files: 0,
            corrupt_files: 0,
            skip_reasons: SkipReasons::default(),
            start_time: Utc::now(),
            end_time: None,
            current_file: None,
            metadata_options,
            data_source,
            results: Vec::new(),
        }
    }

    /// Appends a result and updates the counters.
    ///
    /// Returns the document outcome and the duration to report for it: the
    /// collaborator's measurement when present, otherwise the time since the
    /// previous result (or job start).
    pub fn apply_result(
        &mut self,
        mut result: FileResult,
        now: DateTime<Utc>,
    ) -> Result<(DocumentOutcome, f64), TransitionError> {
        if !self.status.is_active() {
            return Err(TransitionError::NotAcceptingResults {
                status: self.status,
            });
        }
        if self.processed_files >= self.total_files {
            return Err(TransitionError::AllFilesAccounted {
                total: self.total_files,
            });
        }

        let previous = self
            .results
            .last()
            .map(|r| r.timestamp)
            .unwrap_or(self.start_time);
        let duration = result
            .duration_seconds
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or_else(|| seconds_between(previous, now));

        let outcome = result.outcome();
        match outcome {
            DocumentOutcome::Success => self.successful_files += 1,
            DocumentOutcome::Skipped => {
                self.skipped_files += 1;
                if let Some(reason) = result.skip_reason {
                    self.skip_reasons.increment(reason);
                }
            }
            DocumentOutcome::Failed => {
                self.failed_files += 1;
                if result.is_corrupt() {
                    self.corrupt_files += 1;
                }
            }
        }
        self.processed_files += 1;
        self.status = JobStatus::Processing;

        result.timestamp = now;
        result.duration_seconds = Some(duration);
        self.results.push(result);

        Ok((outcome, duration))
    }

    /// Moves the job into a terminal status and returns its total duration in
    /// seconds.
    pub fn finalize(
        &mut self,
        status: JobStatus,
        now: DateTime<Utc>,
    ) -> Result<f64, TransitionError> {
        if !status.is_terminal() {
            return Err(TransitionError::NotTerminal { status });
        }
        if !self.status.is_active() {
            return Err(TransitionError::AlreadyFinal {
                status: self.status,
            });
        }

        let end = now.max(self.start_time);
        self.status = status;
        self.end_time = Some(end);
        self.current_file = None;
        Ok(seconds_between(self.start_time, end))
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// `processed == successful + failed + skipped <= total`.
    pub fn counts_consistent(&self) -> bool {
        self.successful_files
            .checked_add(self.failed_files)
            .and_then(|sum| sum.checked_add(self.skipped_files))
            .is_some_and(|sum| sum == self.processed_files)
            && self.processed_files <= self.total_files
    }

    /// 0 until the job ends.
    pub fn processing_time_seconds(&self) -> f64 {
        match self.end_time {
            Some(end) => seconds_between(self.start_time, end),
            None => 0.0,
        }
    }

    pub fn progress_percentage(&self) -> u8 {
        if self.status.is_terminal() {
            return 100;
        }
        if self.total_files == 0 {
            return 0;
        }
        let done = u128::from(self.processed_files.min(self.total_files));
        (done * 100 / u128::from(self.total_files)) as u8
    }

    /// Recomputes the counters from `results`. Used when the stored counters
    /// are older than the results they describe.
    pub fn recount_from_results(&mut self) {
        let mut successful = 0u64;
        let mut failed = 0u64;
        let mut skipped = 0u64;
        let mut corrupt = 0u64;
        let mut reasons = SkipReasons::default();
        for result in &self.results {
            match result.outcome() {
                DocumentOutcome::Success => successful += 1,
                DocumentOutcome::Skipped => {
                    skipped += 1;
                    if let Some(reason) = result.skip_reason {
                        reasons.increment(reason);
                    }
                }
                DocumentOutcome::Failed => {
                    failed += 1;
                    if result.is_corrupt() {
                        corrupt += 1;
                    }
                }
            }
        }

        self.successful_files = successful;
        self.failed_files = failed;
        self.skipped_files = skipped;
        self.corrupt_files = corrupt;
        self.skip_reasons = reasons;
        self.processed_files = successful + failed + skipped;
        self.total_files = self.total_files.max(self.processed_files);
        if self.status == JobStatus::Pending && self.processed_files > 0 {
            self.status = JobStatus::Processing;
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id.clone(),
            status: self.status,
            progress_percentage: self.progress_percentage(),
            current_file: self.current_file.clone(),
            total_files: self.total_files,
            processed_files: self.processed_files,
            successful_files: self.successful_files,
            failed_files: self.failed_files,
            skipped_files: self.skipped_files,
            skipped_reasons: self.skip_reasons,
            corrupt_files: self.corrupt_files,
            processing_time: self.processing_time_seconds(),
            start_time: self.start_time,
            end_time: self.end_time,
            data_source: self.data_source.clone(),
        }
    }
}

/// Compact view of a job for listings and status polling.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub progress_percentage: u8,
    pub current_file: Option<String>,
    pub total_files: u64,
    pub processed_files: u64,
    pub successful_files: u64,
    pub failed_files: u64,
    pub skipped_files: u64,
    pub skipped_reasons: SkipReasons,
    pub corrupt_files: u64,
    /// Seconds between start and end, 0 while running.
    pub processing_time: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub data_source: DataSource,
}

/// Signed difference clamped at zero, in fractional seconds.
pub(crate) fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    match delta.num_microseconds() {
        Some(us) => (us as f64 / 1_000_000.0).max(0.0),
        None => (delta.num_milliseconds() as f64 / 1000.0).max(0.0),
    }
}
