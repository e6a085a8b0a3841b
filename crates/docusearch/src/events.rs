//! Job event broadcaster for live status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::jobs::record::{JobRecord, JobStatus};
use crate::metrics::DocumentOutcome;

/// What happened to a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEventKind {
    Created,
    FileRecorded {
        filename: String,
        outcome: DocumentOutcome,
    },
    Progress {
        current_file: String,
    },
    Finalized {
        processing_time_seconds: f64,
    },
    Deleted,
    /// Every job was removed. Carries no job id.
    Cleared,
}

/// A job event with the job's state right after the change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    /// Empty for [`JobEventKind::Cleared`].
    pub job_id: String,
    pub status: JobStatus,
    pub processed_files: u64,
    pub total_files: u64,
    pub progress_percentage: u8,
    #[serde(flatten)]
    pub kind: JobEventKind,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn for_record(record: &JobRecord, kind: JobEventKind) -> Self {
        Self {
            job_id: record.id.clone(),
            status: record.status,
            processed_files: record.processed_files,
            total_files: record.total_files,
            progress_percentage: record.progress_percentage(),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn cleared() -> Self {
        Self {
            job_id: String::new(),
            status: JobStatus::Unknown,
            processed_files: 0,
            total_files: 0,
            progress_percentage: 0,
            kind: JobEventKind::Cleared,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcasts job events to any number of subscribers.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    /// Creates a broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
