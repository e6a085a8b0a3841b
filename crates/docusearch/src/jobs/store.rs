//! Job store with file-backed persistence.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::events::{JobEvent, JobEventBroadcaster, JobEventKind};
use crate::jobs::record::{
    DataSource, FileResult, JobRecord, JobStatus, JobSummary, TransitionError,
};
use crate::metrics::{MetricsSnapshot, MetricsStore};
use crate::persistence::derived::remove_derived_documents_for;
use crate::persistence::metadata::metadata_job_ids;
use crate::persistence::{self, PartialJobRecord, ResultsLog};

const JOB_ID_LEN: usize = 8;

/// What `delete_job` removed.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DeleteSummary {
    pub job_id: String,
    pub removed_from_memory: bool,
    pub metadata_removed: bool,
    pub results_removed: bool,
    pub derived_documents_removed: usize,
}

impl DeleteSummary {
    /// Whether anything at all was removed.
    pub fn removed_anything(&self) -> bool {
        self.removed_from_memory
            || self.metadata_removed
            || self.results_removed
            || self.derived_documents_removed > 0
    }
}

/// What `delete_all_jobs` removed.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DeleteAllSummary {
    pub jobs_deleted: usize,
    pub metadata_files_removed: usize,
    pub results_files_removed: usize,
    pub derived_documents_removed: usize,
}

/// Where one store keeps its files.
struct JobFiles {
    metadata_dir: PathBuf,
    results: ResultsLog,
    parsed_documents_dir: PathBuf,
}

impl JobFiles {
    fn save_metadata(&self, record: &JobRecord) {
        if let Err(e) = persistence::save_metadata(&self.metadata_dir, record) {
            log::error!("Failed to save metadata for job {}: {}", record.id, e);
        }
    }

    fn create_results(&self, record: &JobRecord) {
        if let Err(e) = self.results.create(record) {
            log::error!("Failed to create results log for job {}: {}", record.id, e);
        }
    }

    /// Appends the record's newest result, rebuilding the log if the append
    /// fails.
    fn append_result(&self, record: &JobRecord) {
        let Some(result) = record.results.last() else {
            return;
        };
        if let Err(e) = self.results.append(&record.id, result) {
            log::debug!("Append failed for job {} ({}), rewriting log", record.id, e);
            self.rewrite_results(record);
        }
    }

    fn rewrite_results(&self, record: &JobRecord) {
        if let Err(e) = self.results.rewrite(record) {
            log::error!("Failed to write results log for job {}: {}", record.id, e);
        }
    }

    fn remove_metadata(&self, job_id: &str) -> bool {
        persistence::remove_metadata(&self.metadata_dir, job_id).unwrap_or_else(|e| {
            log::error!("Failed to remove metadata for job {}: {}", job_id, e);
            false
        })
    }

    fn remove_results(&self, job_id: &str) -> bool {
        self.results.remove(job_id).unwrap_or_else(|e| {
            log::error!("Failed to remove results log for job {}: {}", job_id, e);
            false
        })
    }

    fn remove_derived(&self, job_ids: &HashSet<String>) -> usize {
        remove_derived_documents_for(&self.parsed_documents_dir, job_ids).unwrap_or_else(|e| {
            log::error!("Failed to remove derived documents: {}", e);
            0
        })
    }

    /// Every job id with a metadata document or a results log on disk.
    fn ids_on_disk(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        match metadata_job_ids(&self.metadata_dir) {
            Ok(found) => ids.extend(found),
            Err(e) => log::warn!("Failed to scan job metadata: {}", e),
        }
        match self.results.job_ids() {
            Ok(found) => ids.extend(found),
            Err(e) => log::warn!("Failed to scan results logs: {}", e),
        }
        ids
    }

    /// Rebuilds one job from its metadata document and/or results log.
    fn recover(&self, job_id: &str) -> Option<JobRecord> {
        let metadata_path = persistence::metadata_path(&self.metadata_dir, job_id);
        let from_metadata = match persistence::load_metadata(&metadata_path) {
            Ok(partial) => partial,
            Err(e) => {
                log::warn!("Ignoring unreadable metadata for job {}: {}", job_id, e);
                None
            }
        };

        let log = match self.results.read(job_id) {
            Ok(log) => log,
            Err(e) => {
                log::warn!("Ignoring unreadable results log for job {}: {}", job_id, e);
                None
            }
        };
        if let Some(log) = &log {
            if log.skipped_lines > 0 {
                log::warn!(
                    "Skipped {} malformed lines in results log for job {}",
                    log.skipped_lines,
                    job_id
                );
            }
        }

        let (partial, results, header_only) = match (from_metadata, log) {
            (Some(partial), Some(log)) => (partial, Some(log.results), false),
            (Some(partial), None) => (partial, None, false),
            (None, Some(log)) => match log.header {
                Some(header) => (header, Some(log.results), true),
                None => {
                    log::warn!("Results log for job {} has no header, skipping", job_id);
                    return None;
                }
            },
            (None, None) => return None,
        };

        let mut record = finish_recovered(partial, job_id, results);
        // The header is only rewritten on finalize, so a running job's
        // counters live in its result lines.
        if header_only
            && (!record.is_finished() || record.processed_files != record.results.len() as u64)
        {
            log::debug!("Recounting job {} from its results log", job_id);
            record.recount_from_results();
        }
        Some(record)
    }
}

fn finish_recovered(
    partial: PartialJobRecord,
    job_id: &str,
    results: Option<Vec<FileResult>>,
) -> JobRecord {
    let mut record = partial.into_record(job_id);
    if record.id != job_id {
        log::warn!(
            "Job document names id {} but is stored as {}, using {}",
            record.id,
            job_id,
            job_id
        );
        record.id = job_id.to_string();
    }
    if let Some(results) = results {
        if !results.is_empty() || record.results.is_empty() {
            record.results = results;
        }
    }
    record
}

#[derive(Default)]
struct JobTable {
    jobs: HashMap<String, JobRecord>,
    /// Ids in creation order.
    order: Vec<String>,
}

impl JobTable {
    fn insert(&mut self, record: JobRecord) {
        let id = record.id.clone();
        if self.jobs.insert(id.clone(), record).is_none() {
            self.order.push(id);
        }
    }

    fn remove(&mut self, job_id: &str) -> Option<JobRecord> {
        let removed = self.jobs.remove(job_id)?;
        self.order.retain(|id| id != job_id);
        Some(removed)
    }

    fn active_count(&self) -> u64 {
        self.jobs.values().filter(|job| job.status.is_active()).count() as u64
    }

    fn new_id(&self) -> String {
        loop {
            let mut id = Uuid::new_v4().simple().to_string();
            id.truncate(JOB_ID_LEN);
            if !self.jobs.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Owns every job record and is the only code that mutates them.
///
/// A single mutex guards the whole table. Metrics are pushed while it is
/// held, so the lock order is always job store, then metrics store.
pub struct JobStore {
    files: JobFiles,
    metrics: Arc<MetricsStore>,
    events: Option<JobEventBroadcaster>,
    table: Mutex<JobTable>,
}

impl JobStore {
    /// Creates an empty store rooted at the configured data directory.
    pub fn new(config: &Config, metrics: Arc<MetricsStore>) -> Self {
        let files = JobFiles {
            metadata_dir: config.metadata_dir(),
            results: ResultsLog::new(config.results_dir()),
            parsed_documents_dir: config.parsed_documents_dir(),
        };
        for dir in [files.metadata_dir.as_path(), files.results.dir()] {
            if let Err(e) = persistence::ensure_dir(dir) {
                log::error!("{}", e);
            }
        }

        Self {
            files,
            metrics,
            events: None,
            table: Mutex::new(JobTable::default()),
        }
    }

    /// Creates a store and recovers every job found on disk.
    pub fn open(config: &Config, metrics: Arc<MetricsStore>) -> Self {
        let store = Self::new(config, metrics);
        store.load_existing_jobs();
        store
    }

    /// Publishes job events on `events`.
    pub fn with_events(mut self, events: JobEventBroadcaster) -> Self {
        self.events = Some(events);
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    pub fn metadata_dir(&self) -> &Path {
        &self.files.metadata_dir
    }

    pub fn results_dir(&self) -> &Path {
        self.files.results.dir()
    }

    fn lock(&self) -> MutexGuard<'_, JobTable> {
        match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn emit(&self, record: &JobRecord, kind: JobEventKind) {
        if let Some(events) = &self.events {
            events.send(JobEvent::for_record(record, kind));
        }
    }

    /// Starts a new Pending job and persists it. A job with no files is
    /// completed immediately.
    pub fn create_job(
        &self,
        total_files: u64,
        metadata_options: Vec<String>,
        data_source: DataSource,
    ) -> String {
        let mut table = self.lock();
        let id = table.new_id();
        let record = JobRecord::new(&id, total_files, metadata_options, data_source);

        self.files.save_metadata(&record);
        self.files.create_results(&record);
        self.emit(&record, JobEventKind::Created);
        log::info!(
            "Created job {} for {} files from {}",
            id,
            total_files,
            record.data_source
        );
        table.insert(record);

        if total_files == 0 {
            self.finalize_locked(&mut table, &id, JobStatus::Completed);
        }
        id
    }

    /// Records one file outcome. Returns whether it was accepted.
    ///
    /// Results for unknown jobs, finished jobs, or beyond `total_files` are
    /// logged and dropped.
    pub fn record_file_result(&self, job_id: &str, result: FileResult) -> bool {
        let mut table = self.lock();
        let Some(record) = table.jobs.get_mut(job_id) else {
            log::warn!("Ignoring file result for unknown job {}", job_id);
            return false;
        };

        let filename = result.filename.clone();
        let (outcome, duration) = match record.apply_result(result, Utc::now()) {
            Ok(applied) => applied,
            Err(e) => {
                log::warn!("Ignoring result for {} in job {}: {}", filename, job_id, e);
                return false;
            }
        };

        self.files.append_result(record);
        self.files.save_metadata(record);
        self.metrics.record_document_outcome(duration, outcome);
        self.emit(record, JobEventKind::FileRecorded { filename, outcome });
        true
    }

    /// Notes which file the caller is working on. Ignored unless the job is
    /// still active.
    pub fn update_progress(&self, job_id: &str, current_file: &str) -> bool {
        let mut table = self.lock();
        let Some(record) = table.jobs.get_mut(job_id) else {
            log::warn!("Ignoring progress for unknown job {}", job_id);
            return false;
        };
        if !record.status.is_active() {
            log::warn!("Ignoring progress for job {} in status {}", job_id, record.status);
            return false;
        }

        record.current_file = Some(current_file.to_string());
        self.files.save_metadata(record);
        self.emit(
            record,
            JobEventKind::Progress {
                current_file: current_file.to_string(),
            },
        );
        true
    }

    /// Moves a job to `Completed` or `Failed` and reports its duration to
    /// the metrics store. Finalizing a finished job changes nothing.
    pub fn finalize_job(&self, job_id: &str, status: JobStatus) -> bool {
        let mut table = self.lock();
        self.finalize_locked(&mut table, job_id, status)
    }

    fn finalize_locked(&self, table: &mut JobTable, job_id: &str, status: JobStatus) -> bool {
        let _span = tracing::info_span!("finalize_job", job_id = %job_id).entered();

        let Some(record) = table.jobs.get_mut(job_id) else {
            log::warn!("Cannot finalize unknown job {}", job_id);
            return false;
        };

        let duration = match record.finalize(status, Utc::now()) {
            Ok(duration) => duration,
            Err(TransitionError::AlreadyFinal { status: current }) if current == status => {
                log::debug!("Job {} is already {}", job_id, current);
                return false;
            }
            Err(e) => {
                log::warn!("Cannot finalize job {} as {}: {}", job_id, status, e);
                return false;
            }
        };

        self.files.rewrite_results(record);
        self.files.save_metadata(record);
        self.metrics
            .record_job_completion(duration, status == JobStatus::Completed);
        self.emit(
            record,
            JobEventKind::Finalized {
                processing_time_seconds: duration,
            },
        );
        log::info!(
            "Job {} {} after {:.2}s ({} ok, {} failed, {} skipped)",
            job_id,
            status,
            duration,
            record.successful_files,
            record.failed_files,
            record.skipped_files
        );
        true
    }

    /// Copy of the record. Its `results` may be empty for recovered jobs; use
    /// [`job_results`](Self::job_results) to read them back from disk.
    pub fn get_job(&self, job_id: &str) -> Option<JobRecord> {
        self.lock().jobs.get(job_id).cloned()
    }

    pub fn job_summary(&self, job_id: &str) -> Option<JobSummary> {
        self.lock().jobs.get(job_id).map(JobRecord::summary)
    }

    /// Summaries of every job, most recently created first.
    pub fn list_jobs(&self) -> Vec<JobSummary> {
        let table = self.lock();
        table
            .order
            .iter()
            .rev()
            .filter_map(|id| table.jobs.get(id))
            .map(JobRecord::summary)
            .collect()
    }

    /// The record with all its results, consulting the results log when the
    /// in-memory results are empty or the job is not loaded.
    pub fn job_results(&self, job_id: &str) -> Option<JobRecord> {
        let cached = self.get_job(job_id);
        match cached {
            Some(mut record) => {
                if record.results.is_empty() && record.processed_files > 0 {
                    match self.files.results.read(job_id) {
                        Ok(Some(log)) => record.results = log.results,
                        Ok(None) => {}
                        Err(e) => log::warn!("Failed to read results for job {}: {}", job_id, e),
                    }
                }
                Some(record)
            }
            None => self.files.recover(job_id),
        }
    }

    /// The raw results log text.
    pub fn read_results_log(&self, job_id: &str) -> Option<String> {
        match self.files.results.read_raw(job_id) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Failed to read results log for job {}: {}", job_id, e);
                None
            }
        }
    }

    /// Removes a job from memory along with its metadata, results log and
    /// derived documents. Safe to repeat.
    pub fn delete_job(&self, job_id: &str) -> DeleteSummary {
        let mut table = self.lock();
        let removed = table.remove(job_id);

        let mut ids = HashSet::new();
        ids.insert(job_id.to_string());
        let summary = DeleteSummary {
            job_id: job_id.to_string(),
            removed_from_memory: removed.is_some(),
            metadata_removed: self.files.remove_metadata(job_id),
            results_removed: self.files.remove_results(job_id),
            derived_documents_removed: self.files.remove_derived(&ids),
        };

        if let Some(record) = &removed {
            self.emit(record, JobEventKind::Deleted);
        }
        if summary.removed_anything() {
            log::info!(
                "Deleted job {} ({} derived documents)",
                job_id,
                summary.derived_documents_removed
            );
        } else {
            log::debug!("Nothing to delete for job {}", job_id);
        }
        summary
    }

    /// Removes every job, known or only on disk, with all its artifacts, and
    /// resets the metrics store.
    pub fn delete_all_jobs(&self) -> DeleteAllSummary {
        let mut table = self.lock();

        let mut ids: BTreeSet<String> = table.jobs.keys().cloned().collect();
        ids.extend(self.files.ids_on_disk());

        let mut summary = DeleteAllSummary {
            jobs_deleted: table.jobs.len(),
            ..Default::default()
        };
        *table = JobTable::default();

        for id in &ids {
            if self.files.remove_metadata(id) {
                summary.metadata_files_removed += 1;
            }
            if self.files.remove_results(id) {
                summary.results_files_removed += 1;
            }
        }
        let ids: HashSet<String> = ids.into_iter().collect();
        summary.derived_documents_removed = self.files.remove_derived(&ids);

        self.metrics.reset();
        if let Some(events) = &self.events {
            events.send(JobEvent::cleared());
        }
        log::info!(
            "Deleted all jobs: {} in memory, {} metadata files, {} results logs, {} derived documents",
            summary.jobs_deleted,
            summary.metadata_files_removed,
            summary.results_files_removed,
            summary.derived_documents_removed
        );
        summary
    }

    /// Loads every job found on disk that is not already in memory. Returns
    /// how many were loaded.
    pub fn load_existing_jobs(&self) -> usize {
        let _span = tracing::info_span!("load_existing_jobs").entered();

        let mut table = self.lock();
        let mut recovered: Vec<JobRecord> = self
            .files
            .ids_on_disk()
            .into_iter()
            .filter(|id| !table.jobs.contains_key(id))
            .filter_map(|id| self.files.recover(&id))
            .collect();
        recovered.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));

        let loaded = recovered.len();
        for record in recovered {
            if record.status.is_active() {
                log::warn!(
                    "Recovered job {} is still {}; it will not resume on its own",
                    record.id,
                    record.status
                );
            }
            table.insert(record);
        }
        if loaded > 0 {
            let JobTable { jobs, order } = &mut *table;
            order.sort_by(|a, b| match (jobs.get(a), jobs.get(b)) {
                (Some(x), Some(y)) => x.start_time.cmp(&y.start_time).then(a.cmp(b)),
                _ => a.cmp(b),
            });
        }

        log::info!(
            "Loaded {} jobs from {}",
            loaded,
            self.files.metadata_dir.display()
        );
        loaded
    }

    /// Number of Pending or Processing jobs.
    pub fn active_job_count(&self) -> u64 {
        self.lock().active_count()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    /// Metrics with `currently_processing` taken from this store.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let active = self.active_job_count();
        self.metrics.snapshot(active)
    }

    pub fn metrics_json(&self) -> String {
        let active = self.active_job_count();
        self.metrics.to_json(active)
    }

    pub fn metrics_prometheus(&self) -> String {
        let active = self.active_job_count();
        self.metrics.to_prometheus_text(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::record::SkipReason;
    use crate::metrics::DocumentOutcome;
    use tempfile::TempDir;

    fn store_in(dir: &Path) -> JobStore {
        let config = Config::with_data_dir(dir);
        let metrics = Arc::new(MetricsStore::from_config(&config));
        JobStore::new(&config, metrics)
    }

    #[test]
    fn test_create_job() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());

        let id = store.create_job(2, vec!["title".to_string()], DataSource::Local);

        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        let job = store.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.total_files, 2);
        assert!(persistence::metadata_path(store.metadata_dir(), &id).exists());
        assert_eq!(store.read_results_log(&id).unwrap().lines().count(), 1);
        assert_eq!(store.active_job_count(), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        let ids: HashSet<String> = (0..50)
            .map(|_| store.create_job(1, Vec::new(), DataSource::Local))
            .collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_record_file_result_updates_counts() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        let id = store.create_job(3, Vec::new(), DataSource::Local);

        assert!(store.record_file_result(&id, FileResult::success("a.pdf", None)));
        assert_eq!(store.get_job(&id).unwrap().status, JobStatus::Processing);
        assert!(store.record_file_result(&id, FileResult::failure("b.pdf", "File is corrupt")));
        assert!(store.record_file_result(
            &id,
            FileResult::skipped("c.exe", SkipReason::UnsupportedFormat, "unsupported")
        ));

        let job = store.get_job(&id).unwrap();
        assert_eq!(job.processed_files, 3);
        assert_eq!(job.successful_files, 1);
        assert_eq!(job.failed_files, 1);
        assert_eq!(job.skipped_files, 1);
        assert_eq!(job.corrupt_files, 1);
        assert!(job.counts_consistent());
        assert_eq!(job.results.len(), 3);
        assert_eq!(store.read_results_log(&id).unwrap().lines().count(), 4);

        let snapshot = store.metrics_snapshot();
        assert_eq!(snapshot.documents.total_processed, 3);
        assert_eq!(snapshot.documents.total_skipped, 1);
        assert_eq!(snapshot.documents.processing_time_samples, 2);
    }

    #[test]
    fn test_results_beyond_total_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        let id = store.create_job(1, Vec::new(), DataSource::Local);

        assert!(store.record_file_result(&id, FileResult::success("a.pdf", None)));
        assert!(!store.record_file_result(&id, FileResult::success("b.pdf", None)));

        let job = store.get_job(&id).unwrap();
        assert_eq!(job.processed_files, 1);
        assert!(job.counts_consistent());
        assert_eq!(store.metrics_snapshot().documents.total_processed, 1);
    }

    #[test]
    fn test_unknown_job_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());

        assert!(!store.record_file_result("nope", FileResult::success("a.pdf", None)));
        assert!(!store.update_progress("nope", "a.pdf"));
        assert!(!store.finalize_job("nope", JobStatus::Completed));
        assert!(store.get_job("nope").is_none());
        assert_eq!(store.metrics_snapshot().documents.total_processed, 0);
    }

    #[test]
    fn test_zero_file_job_completes_immediately() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        let id = store.create_job(0, Vec::new(), DataSource::Local);

        let job = store.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.end_time.is_some());
        assert_eq!(job.progress_percentage(), 100);
        assert_eq!(store.metrics_snapshot().jobs.total, 1);

        // A later finalize changes nothing.
        assert!(!store.finalize_job(&id, JobStatus::Completed));
        assert_eq!(store.metrics_snapshot().jobs.total, 1);
    }

    #[test]
    fn test_finalize_is_terminal() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        let id = store.create_job(2, Vec::new(), DataSource::Local);
        store.record_file_result(&id, FileResult::failure("a.pdf", "boom"));

        assert!(store.finalize_job(&id, JobStatus::Failed));
        let end = store.get_job(&id).unwrap().end_time;

        assert!(!store.finalize_job(&id, JobStatus::Completed));
        assert!(!store.record_file_result(&id, FileResult::success("b.pdf", None)));
        assert!(!store.update_progress(&id, "b.pdf"));

        let job = store.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.end_time, end);

        let snapshot = store.metrics_snapshot();
        assert_eq!(snapshot.jobs.total, 1);
        assert_eq!(snapshot.jobs.failed, 1);
        assert_eq!(snapshot.jobs.currently_processing, 0);
    }

    #[test]
    fn test_finalize_requires_terminal_status() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        let id = store.create_job(1, Vec::new(), DataSource::Local);

        assert!(!store.finalize_job(&id, JobStatus::Processing));
        assert_eq!(store.get_job(&id).unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn test_update_progress() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        let id = store.create_job(2, Vec::new(), DataSource::Local);

        assert!(store.update_progress(&id, "a.pdf"));
        assert_eq!(
            store.job_summary(&id).unwrap().current_file.as_deref(),
            Some("a.pdf")
        );

        store.finalize_job(&id, JobStatus::Failed);
        assert!(store.job_summary(&id).unwrap().current_file.is_none());
    }

    #[test]
    fn test_list_jobs_most_recent_first() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        let first = store.create_job(1, Vec::new(), DataSource::Local);
        let second = store.create_job(1, Vec::new(), DataSource::Local);
        let third = store.create_job(1, Vec::new(), DataSource::Local);

        let ids: Vec<String> = store.list_jobs().into_iter().map(|s| s.job_id).collect();
        assert_eq!(ids, vec![third, second, first]);
    }

    #[test]
    fn test_delete_job_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        let id = store.create_job(1, Vec::new(), DataSource::Local);
        store.record_file_result(&id, FileResult::success("a.pdf", None));

        let parsed = dir.path().join("parsed_documents");
        std::fs::create_dir_all(&parsed).unwrap();
        std::fs::write(
            parsed.join("a.json"),
            format!(r#"{{"job_id": "{}", "filename": "a.pdf"}}"#, id),
        )
        .unwrap();

        let first = store.delete_job(&id);
        assert!(first.removed_from_memory);
        assert!(first.metadata_removed);
        assert!(first.results_removed);
        assert_eq!(first.derived_documents_removed, 1);
        assert!(store.get_job(&id).is_none());

        let second = store.delete_job(&id);
        assert!(!second.removed_anything());
        assert!(store.list_jobs().is_empty());
    }

    #[test]
    fn test_job_results_falls_back_to_log() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = store_in(dir.path());
            let id = store.create_job(2, Vec::new(), DataSource::Local);
            store.record_file_result(&id, FileResult::success("a.pdf", None));
            store.record_file_result(&id, FileResult::success("b.pdf", None));
            store.finalize_job(&id, JobStatus::Completed);
            id
        };

        // Metadata documents do not carry results.
        let store = store_in(dir.path());
        assert_eq!(store.load_existing_jobs(), 1);
        let results = store.job_results(&id).unwrap().results;
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].filename, "b.pdf");
    }

    #[test]
    fn test_job_results_for_unloaded_job() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = store_in(dir.path());
            let id = store.create_job(1, Vec::new(), DataSource::Local);
            store.record_file_result(&id, FileResult::success("a.pdf", None));
            id
        };

        let store = store_in(dir.path());
        let record = store.job_results(&id).unwrap();
        assert_eq!(record.results.len(), 1);
        assert!(store.get_job(&id).is_none());
    }

    #[test]
    fn test_events_are_published() {
        let dir = TempDir::new().unwrap();
        let events = JobEventBroadcaster::new(16);
        let mut rx = events.subscribe();
        let store = store_in(dir.path()).with_events(events);

        let id = store.create_job(1, Vec::new(), DataSource::Local);
        store.update_progress(&id, "a.pdf");
        store.record_file_result(&id, FileResult::success("a.pdf", None));
        store.finalize_job(&id, JobStatus::Completed);
        store.delete_job(&id);
        store.delete_all_jobs();

        let kinds: Vec<JobEventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.kind)
            .collect();
        assert_eq!(kinds.len(), 6);
        assert_eq!(kinds[0], JobEventKind::Created);
        assert!(matches!(kinds[1], JobEventKind::Progress { .. }));
        assert_eq!(
            kinds[2],
            JobEventKind::FileRecorded {
                filename: "a.pdf".to_string(),
                outcome: DocumentOutcome::Success
            }
        );
        assert!(matches!(kinds[3], JobEventKind::Finalized { .. }));
        assert_eq!(kinds[4], JobEventKind::Deleted);
        assert_eq!(kinds[5], JobEventKind::Cleared);
    }

    #[test]
    fn test_missing_results_log_is_rebuilt_on_append() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        let id = store.create_job(2, Vec::new(), DataSource::Local);
        store.record_file_result(&id, FileResult::success("a.pdf", None));

        std::fs::remove_file(dir.path().join("job_results").join(format!("job_{}_results.jsonl", id)))
            .unwrap();
        store.record_file_result(&id, FileResult::success("b.pdf", None));

        let raw = store.read_results_log(&id).unwrap();
        assert_eq!(raw.lines().count(), 3);
    }
}
