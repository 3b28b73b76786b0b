use std::fmt;

use thiserror::Error;

use crate::error::{ArchiveError, IndexError, TransformError, UncompressError, WorkingAreaError};
use crate::job::FailureKind;

/// Failure of one ingestion step.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Working area unavailable: {0}")]
    WorkingArea(#[from] WorkingAreaError),

    #[error("Uncompressing the upload failed: {0}")]
    Uncompress(#[from] UncompressError),

    #[error("Transformation to working format failed: {0}")]
    WorkingFormat(#[source] TransformError),

    #[error("Transformation to index format failed: {0}")]
    IndexFormat(#[source] TransformError),

    #[error("Index update failed: {0}")]
    Index(#[from] IndexError),

    #[error("Archiving failed: {0}")]
    Archive(#[from] ArchiveError),
}

impl PipelineError {
    /// Name of the step that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::WorkingArea(_) => "working area",
            PipelineError::Uncompress(_) => "uncompress",
            PipelineError::WorkingFormat(_) => "working format",
            PipelineError::IndexFormat(_) => "index format",
            PipelineError::Index(_) => "index",
            PipelineError::Archive(_) => "archive",
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            PipelineError::WorkingArea(_) => FailureKind::WorkingArea,
            PipelineError::Uncompress(_) => FailureKind::Uncompress,
            PipelineError::WorkingFormat(_) | PipelineError::IndexFormat(_) => {
                FailureKind::Transform
            }
            PipelineError::Index(_) => FailureKind::Index,
            PipelineError::Archive(ArchiveError::NotFound(_)) => FailureKind::NotFound,
            PipelineError::Archive(_) => FailureKind::Archive,
        }
    }
}

/// How far a replay got before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayProgress {
    pub version: Option<u32>,
    pub base_applied: bool,
    pub last_update: Option<u32>,
}

impl fmt::Display for ReplayProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.version, self.base_applied) {
            (Some(version), true) => write!(f, "{}.{}", version, self.last_update.unwrap_or(0)),
            (Some(version), false) => write!(f, "nothing of version {}", version),
            (None, _) => write!(f, "nothing"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReindexFailure {
    #[error("Working area unavailable: {0}")]
    WorkingArea(#[from] WorkingAreaError),

    #[error("Reading the archive failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Uncompressing an archived artifact failed: {0}")]
    Uncompress(#[from] UncompressError),

    #[error("Index update failed: {0}")]
    Index(#[from] IndexError),
}

/// A reindex that stopped early, with the last artifact it applied.
#[derive(Error, Debug)]
#[error("Reindex stopped after applying {progress}: {source}")]
pub struct ReindexError {
    pub progress: ReplayProgress,
    #[source]
    pub source: ReindexFailure,
}

impl ReindexError {
    pub fn new<E: Into<ReindexFailure>>(progress: ReplayProgress, source: E) -> Self {
        Self {
            progress,
            source: source.into(),
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match &self.source {
            ReindexFailure::Archive(ArchiveError::NotFound(_)) => FailureKind::NotFound,
            ReindexFailure::WorkingArea(_) => FailureKind::WorkingArea,
            ReindexFailure::Archive(_) => FailureKind::Archive,
            ReindexFailure::Uncompress(_) => FailureKind::Uncompress,
            ReindexFailure::Index(_) => FailureKind::Index,
        }
    }
}
