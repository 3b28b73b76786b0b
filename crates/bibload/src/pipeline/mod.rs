pub mod error;
pub mod process;
pub mod progress;
pub mod reindex;
pub mod request;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{PipelineError, ReindexError, ReindexFailure, ReplayProgress};
pub use process::ProcessOrchestrator;
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use reindex::ReindexOrchestrator;
pub use request::TransformationRequest;

/// Advisory lock serializing index and archive mutations per
/// (core, institution), shared by ingestion and reindex.
pub type InstitutionLocks = crate::archive::KeyedLocks;
