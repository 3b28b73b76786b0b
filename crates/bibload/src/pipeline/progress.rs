use crate::job::{JobPhase, JobProgressTracker};

/// Events emitted by the orchestrators while a job runs.
pub enum ProgressEvent {
    Phase { phase: JobPhase, message: String },
    /// One archived artifact was sent to the index during a replay.
    Replayed { label: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges orchestrator events to the job progress broadcast channel.
pub struct BroadcastProgress {
    tracker: JobProgressTracker,
}

impl BroadcastProgress {
    pub fn new(tracker: JobProgressTracker) -> Self {
        Self { tracker }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { phase, message } => {
                self.tracker.update_phase(phase, &message);
            }
            ProgressEvent::Replayed { label } => {
                self.tracker
                    .update_phase(JobPhase::Replaying, &format!("Applied {}", label));
            }
        }
    }
}

pub(crate) fn phase(progress: &dyn ProgressReporter, phase: JobPhase, message: impl Into<String>) {
    progress.report(ProgressEvent::Phase {
        phase,
        message: message.into(),
    });
}
