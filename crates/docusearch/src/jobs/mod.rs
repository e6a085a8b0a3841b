pub mod record;
pub mod store;

pub use record::{
    DataSource, FileResult, JobRecord, JobStatus, JobSummary, SkipReason, SkipReasons,
    TransitionError,
};
pub use store::{DeleteAllSummary, DeleteSummary, JobStore};
