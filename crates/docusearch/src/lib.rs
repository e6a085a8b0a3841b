pub mod config;
pub mod error;
pub mod events;
pub mod jobs;
pub mod metrics;
pub mod persistence;
pub mod telemetry;

pub use config::{load_config, Config};
pub use error::{
    ConfigError, DocuSearchError, ExportError, Result, StorageError, TelemetryError,
};
pub use events::{JobEvent, JobEventBroadcaster, JobEventKind};
pub use jobs::{
    DataSource, DeleteAllSummary, DeleteSummary, FileResult, JobRecord, JobStatus, JobStore,
    JobSummary, SkipReason,
};
pub use metrics::{
    DocumentOutcome, MetricsSnapshot, MetricsStore, PersistencePolicy, RollingWindow,
};
pub use telemetry::{init_logging, LogFormat};
