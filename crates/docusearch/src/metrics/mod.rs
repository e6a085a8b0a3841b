pub mod export;
pub mod store;
pub mod window;

pub use export::{
    DocumentMetrics, ExportedMetric, JobMetrics, MetricKind, MetricsSnapshot, SystemMetrics,
    EXPORTED_METRICS,
};
pub use store::{
    DocumentCounters, DocumentOutcome, JobCounters, MetricsStore, PersistencePolicy,
    DEFAULT_DOCUMENT_WINDOW_CAPACITY, DEFAULT_JOB_WINDOW_CAPACITY,
};
pub use window::RollingWindow;
