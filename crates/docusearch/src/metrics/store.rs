//! Process-wide job and document metrics with disk persistence.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::metrics::export::{DocumentMetrics, JobMetrics, MetricsSnapshot, SystemMetrics};
use crate::metrics::window::{mean_of, percentile_of_sorted, sort_samples, RollingWindow};
use crate::persistence::metrics_file::{self, MetricsDocument};

pub const DEFAULT_JOB_WINDOW_CAPACITY: usize = 1000;
pub const DEFAULT_DOCUMENT_WINDOW_CAPACITY: usize = 10_000;

/// How a processed document ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOutcome {
    Success,
    Failed,
    Skipped,
}

/// When the metrics snapshot document is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistencePolicy {
    /// After every mutating call.
    #[default]
    EveryMutation,
    /// At most once per `interval`; pending state is written by `flush()` or
    /// on drop. A crash loses up to one interval of updates.
    Debounced { interval: Duration },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobCounters {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub successful: u64,
    #[serde(default)]
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentCounters {
    #[serde(default)]
    pub total_processed: u64,
    #[serde(default)]
    pub total_successful: u64,
    #[serde(default)]
    pub total_failed: u64,
    #[serde(default)]
    pub total_skipped: u64,
    #[serde(default, alias = "total_processing_time")]
    pub total_processing_time_seconds: f64,
}

struct MetricsState {
    collection_start_time: DateTime<Utc>,
    jobs: JobCounters,
    documents: DocumentCounters,
    job_window: RollingWindow,
    document_window: RollingWindow,
    dirty: bool,
    last_write: Option<Instant>,
}

impl MetricsState {
    fn empty(job_capacity: usize, document_capacity: usize) -> Self {
        Self {
            collection_start_time: Utc::now(),
            jobs: JobCounters::default(),
            documents: DocumentCounters::default(),
            job_window: RollingWindow::new(job_capacity),
            document_window: RollingWindow::new(document_capacity),
            dirty: false,
            last_write: None,
        }
    }

    fn from_document(doc: MetricsDocument, job_capacity: usize, document_capacity: usize) -> Self {
        Self {
            collection_start_time: doc.collection_start_time.unwrap_or_else(Utc::now),
            jobs: doc.jobs,
            documents: doc.documents,
            job_window: RollingWindow::from_samples(job_capacity, doc.job_latencies),
            document_window: RollingWindow::from_samples(
                document_capacity,
                doc.document_latencies,
            ),
            dirty: false,
            last_write: None,
        }
    }

    fn to_document(&self) -> MetricsDocument {
        MetricsDocument {
            collection_start_time: Some(self.collection_start_time),
            last_updated: Some(Utc::now()),
            jobs: self.jobs,
            documents: self.documents,
            job_latencies: self.job_window.samples(),
            document_latencies: self.document_window.samples(),
        }
    }
}

/// Aggregated job/document counters plus rolling latency windows.
///
/// One instance is built at startup and shared (`Arc`) with everything that
/// records or reads metrics. All state sits behind a single mutex.
pub struct MetricsStore {
    path: Option<PathBuf>,
    policy: PersistencePolicy,
    state: Mutex<MetricsState>,
}

impl MetricsStore {
    /// Opens the store at `path`, restoring the persisted snapshot if one
    /// exists. A missing or unreadable snapshot starts from zero.
    pub fn open<P: AsRef<Path>>(
        path: P,
        job_capacity: usize,
        document_capacity: usize,
        policy: PersistencePolicy,
    ) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match metrics_file::load(&path) {
            Ok(Some(doc)) => {
                log::info!("Restored metrics snapshot from {}", path.display());
                MetricsState::from_document(doc, job_capacity, document_capacity)
            }
            Ok(None) => MetricsState::empty(job_capacity, document_capacity),
            Err(e) => {
                log::warn!("Ignoring unreadable metrics snapshot: {}", e);
                MetricsState::empty(job_capacity, document_capacity)
            }
        };

        Self {
            path: Some(path),
            policy,
            state: Mutex::new(state),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::open(
            config.metrics_path(),
            config.metrics.job_window_capacity,
            config.metrics.document_window_capacity,
            config.persistence_policy(),
        )
    }

    /// A store that never touches the disk.
    pub fn in_memory(job_capacity: usize, document_capacity: usize) -> Self {
        Self {
            path: None,
            policy: PersistencePolicy::EveryMutation,
            state: Mutex::new(MetricsState::empty(job_capacity, document_capacity)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Metrics store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Records a finished job and its wall-clock duration.
    pub fn record_job_completion(&self, duration_seconds: f64, success: bool) {
        let duration = sanitize_duration(duration_seconds);
        let mut state = self.lock();
        state.jobs.total = state.jobs.total.saturating_add(1);
        if success {
            state.jobs.successful = state.jobs.successful.saturating_add(1);
        } else {
            state.jobs.failed = state.jobs.failed.saturating_add(1);
        }
        state.job_window.push(duration);
        self.after_mutation(&mut state);
    }

    /// Records one document outcome. Skipped documents are counted but add
    /// no latency sample.
    pub fn record_document_outcome(&self, duration_seconds: f64, outcome: DocumentOutcome) {
        let duration = sanitize_duration(duration_seconds);
        let mut state = self.lock();
        state.documents.total_processed = state.documents.total_processed.saturating_add(1);
        state.documents.total_processing_time_seconds += duration;
        match outcome {
            DocumentOutcome::Success => {
                state.documents.total_successful =
                    state.documents.total_successful.saturating_add(1);
                state.document_window.push(duration);
            }
            DocumentOutcome::Failed => {
                state.documents.total_failed = state.documents.total_failed.saturating_add(1);
                state.document_window.push(duration);
            }
            DocumentOutcome::Skipped => {
                state.documents.total_skipped = state.documents.total_skipped.saturating_add(1);
            }
        }
        self.after_mutation(&mut state);
    }

    /// Point-in-time copy of all metrics. `currently_processing` comes from
    /// the live job store.
    pub fn snapshot(&self, currently_processing: u64) -> MetricsSnapshot {
        let (start, jobs, documents, mut job_samples, mut document_samples) = {
            let state = self.lock();
            (
                state.collection_start_time,
                state.jobs,
                state.documents,
                state.job_window.samples(),
                state.document_window.samples(),
            )
        };

        sort_samples(&mut job_samples);
        sort_samples(&mut document_samples);
        let now = Utc::now();

        MetricsSnapshot {
            timestamp: now,
            jobs: JobMetrics {
                total: jobs.total,
                successful: jobs.successful,
                failed: jobs.failed,
                currently_processing,
                p50_latency_seconds: percentile_of_sorted(&job_samples, 50.0),
                p95_latency_seconds: percentile_of_sorted(&job_samples, 95.0),
                avg_processing_time_seconds: mean_of(&job_samples),
                latency_samples: job_samples.len() as u64,
            },
            documents: DocumentMetrics {
                total_processed: documents.total_processed,
                total_successful: documents.total_successful,
                total_failed: documents.total_failed,
                total_skipped: documents.total_skipped,
                p50_processing_time_seconds: percentile_of_sorted(&document_samples, 50.0),
                p95_processing_time_seconds: percentile_of_sorted(&document_samples, 95.0),
                avg_processing_time_seconds: mean_of(&document_samples),
                total_processing_time_seconds: documents.total_processing_time_seconds,
                processing_time_samples: document_samples.len() as u64,
            },
            system: SystemMetrics {
                uptime_seconds: crate::jobs::record::seconds_between(start, now),
                metrics_collection_start: start,
            },
        }
    }

    /// Prometheus text for a fresh snapshot. Export failures are logged and
    /// yield an empty body.
    pub fn to_prometheus_text(&self, currently_processing: u64) -> String {
        match self.snapshot(currently_processing).to_prometheus_text() {
            Ok(text) => text,
            Err(e) => {
                log::error!("Failed to render Prometheus metrics: {}", e);
                String::new()
            }
        }
    }

    /// Pretty JSON for a fresh snapshot. Export failures are logged and yield
    /// an empty object.
    pub fn to_json(&self, currently_processing: u64) -> String {
        match self.snapshot(currently_processing).to_json() {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to render metrics JSON: {}", e);
                "{}".to_string()
            }
        }
    }

    /// Zeroes every counter, clears both windows and restarts the collection
    /// period. The empty state is written immediately.
    pub fn reset(&self) {
        let mut state = self.lock();
        let job_capacity = state.job_window.capacity();
        let document_capacity = state.document_window.capacity();
        *state = MetricsState::empty(job_capacity, document_capacity);
        state.dirty = true;
        self.write(&mut state);
        log::info!("Metrics data has been reset");
    }

    /// Writes pending state, if any.
    pub fn flush(&self) {
        let mut state = self.lock();
        if state.dirty {
            self.write(&mut state);
        }
    }

    /// Current `(job, document)` window lengths.
    pub fn window_lengths(&self) -> (usize, usize) {
        let state = self.lock();
        (state.job_window.len(), state.document_window.len())
    }

    fn after_mutation(&self, state: &mut MetricsState) {
        state.dirty = true;
        let due = match self.policy {
            PersistencePolicy::EveryMutation => true,
            PersistencePolicy::Debounced { interval } => state
                .last_write
                .map_or(true, |last| last.elapsed() >= interval),
        };
        if due {
            self.write(state);
        }
    }

    fn write(&self, state: &mut MetricsState) {
        let Some(path) = &self.path else {
            state.dirty = false;
            return;
        };

        match metrics_file::save(path, &state.to_document()) {
            Ok(()) => {
                state.dirty = false;
                state.last_write = Some(Instant::now());
            }
            // In-memory state stays authoritative; the next write retries.
            Err(e) => log::error!("Failed to persist metrics snapshot: {}", e),
        }
    }
}

impl Drop for MetricsStore {
    fn drop(&mut self) {
        self.flush();
    }
}

fn sanitize_duration(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}
