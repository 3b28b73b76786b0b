pub mod executor;
pub mod handle;
pub mod model;
pub mod progress;
pub mod registry;

pub use executor::{JobExecutor, Work};
pub use handle::JobHandle;
pub use model::{
    FailureKind, IngestionReport, JobFailure, JobKind, JobOutcome, JobResult, JobStatus,
    ReindexReport, ReplayedRequest,
};
pub use progress::{JobPhase, JobProgressBroadcaster, JobProgressEvent, JobProgressTracker};
pub use registry::JobRegistry;
