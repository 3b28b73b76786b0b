//! Job progress broadcaster for real-time job status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::model::JobStatus;

/// Phase of job processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Started,
    Uncompressing,
    TransformingToWorkingFormat,
    TransformingToIndexFormat,
    Indexing,
    Archiving,
    DeletingFromIndex,
    Replaying,
    Cleanup,
    Completed,
    Failed,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Queued => write!(f, "Queued"),
            JobPhase::Started => write!(f, "Started"),
            JobPhase::Uncompressing => write!(f, "Uncompressing"),
            JobPhase::TransformingToWorkingFormat => write!(f, "Transforming to working format"),
            JobPhase::TransformingToIndexFormat => write!(f, "Transforming to index format"),
            JobPhase::Indexing => write!(f, "Indexing"),
            JobPhase::Archiving => write!(f, "Archiving"),
            JobPhase::DeletingFromIndex => write!(f, "Deleting from index"),
            JobPhase::Replaying => write!(f, "Replaying"),
            JobPhase::Cleanup => write!(f, "Cleaning up"),
            JobPhase::Completed => write!(f, "Completed"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    /// Display name of the job.
    pub name: String,
    pub phase: JobPhase,
    pub status: JobStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, name: &str, phase: JobPhase, message: &str) -> Self {
        let status = match phase {
            JobPhase::Queued => JobStatus::Created,
            JobPhase::Completed => JobStatus::Succeeded,
            JobPhase::Failed => JobStatus::Failed,
            _ => JobStatus::Running,
        };

        Self {
            job_id: job_id.to_string(),
            name: name.to_string(),
            phase,
            status,
            message: message.to_string(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn failed(job_id: &str, name: &str, error: &str) -> Self {
        let mut event = Self::new(job_id, name, JobPhase::Failed, "Processing failed");
        event.error = Some(error.to_string());
        event
    }
}

/// Broadcasts job progress events to any number of subscribers.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Starts tracking a job, announcing it as queued.
    pub fn start_job(&self, job_id: &str, name: &str) -> JobProgressTracker {
        let tracker = JobProgressTracker::new(job_id, name, self.clone());
        tracker.update_phase(JobPhase::Queued, "Job queued for processing");
        tracker
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Tracks progress for a single job.
#[derive(Clone)]
pub struct JobProgressTracker {
    job_id: String,
    name: String,
    broadcaster: JobProgressBroadcaster,
}

impl JobProgressTracker {
    pub fn new(job_id: &str, name: &str, broadcaster: JobProgressBroadcaster) -> Self {
        Self {
            job_id: job_id.to_string(),
            name: name.to_string(),
            broadcaster,
        }
    }

    pub fn update_phase(&self, phase: JobPhase, message: &str) {
        self.broadcaster
            .send(JobProgressEvent::new(&self.job_id, &self.name, phase, message));
    }

    pub fn completed(&self, message: &str) {
        self.update_phase(JobPhase::Completed, message);
    }

    pub fn failed(&self, error: &str) {
        self.broadcaster
            .send(JobProgressEvent::failed(&self.job_id, &self.name, error));
    }
}
