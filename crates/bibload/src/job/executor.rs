use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::error::JobError;
use crate::job::handle::JobHandle;
use crate::job::model::{JobFailure, JobResult};
use crate::job::progress::{JobPhase, JobProgressBroadcaster, JobProgressTracker};

/// A job's single unit of work.
pub type Work = Box<dyn FnOnce() -> JobResult + Send + 'static>;

struct Task {
    handle: JobHandle,
    work: Work,
}

/// Fixed pool of worker threads running submitted jobs.
pub struct JobExecutor {
    task_sender: Sender<Task>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    progress: Option<JobProgressBroadcaster>,
}

impl JobExecutor {
    pub fn new(worker_count: usize) -> Result<Self, JobError> {
        Self::with_progress(worker_count, None)
    }

    /// Creates a pool that reports job start and completion to `progress`.
    /// A `worker_count` of zero is treated as one.
    pub fn with_progress(
        worker_count: usize,
        progress: Option<JobProgressBroadcaster>,
    ) -> Result<Self, JobError> {
        let worker_count = worker_count.max(1);
        let (task_sender, task_receiver) = unbounded::<Task>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let task_rx = task_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_progress = progress.clone();

            let handle = thread::Builder::new()
                .name(format!("bibload-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, task_rx, shutdown_flag, worker_progress))
                .map_err(|e| JobError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            task_sender,
            workers,
            shutdown,
            progress,
        })
    }

    /// Queues `work` for `handle`. Never blocks.
    pub fn submit(&self, handle: JobHandle, work: Work) -> Result<JobHandle, JobError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(JobError::ChannelClosed);
        }

        if let Some(ref progress) = self.progress {
            progress.start_job(handle.id(), handle.name());
        }

        self.task_sender
            .send(Task {
                handle: handle.clone(),
                work,
            })
            .map_err(|_| JobError::ChannelClosed)?;

        debug!("Queued job {} ({})", handle.id(), handle.name());
        Ok(handle)
    }

    /// Stops accepting new jobs. Queued jobs still run.
    pub fn shutdown(&self) {
        info!("Shutting down job executor...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Drains the queue and joins every worker.
    pub fn wait(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Drop sender to signal workers to exit
        drop(self.task_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

fn run_worker(
    worker_id: usize,
    task_receiver: Receiver<Task>,
    shutdown: Arc<AtomicBool>,
    progress: Option<JobProgressBroadcaster>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        match task_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(task) => run_task(worker_id, task, progress.as_ref()),
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Relaxed) && task_receiver.is_empty() {
                    debug!("Worker {} received shutdown signal", worker_id);
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} task channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn run_task(worker_id: usize, task: Task, progress: Option<&JobProgressBroadcaster>) {
    let Task { handle, work } = task;
    debug!("Worker {} running job {}", worker_id, handle.id());

    let tracker = progress.map(|p| JobProgressTracker::new(handle.id(), handle.name(), p.clone()));
    handle.mark_running();
    if let Some(ref tracker) = tracker {
        tracker.update_phase(JobPhase::Started, "Job started");
    }

    let result = panic::catch_unwind(AssertUnwindSafe(work))
        .unwrap_or_else(|payload| Err(JobFailure::panic(&panic_message(payload.as_ref()))));

    match &result {
        Ok(_) => info!("Job {} ({}) succeeded", handle.id(), handle.name()),
        Err(failure) => warn!(
            "Job {} ({}) failed: {}",
            handle.id(),
            handle.name(),
            failure.message
        ),
    }

    if let Some(ref tracker) = tracker {
        match &result {
            Ok(_) => tracker.completed("Processing completed successfully"),
            Err(failure) => tracker.failed(&failure.message),
        }
    }

    if !handle.complete(result) {
        error!("Job {} already had a result", handle.id());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::model::{FailureKind, IngestionReport, JobKind, JobOutcome, JobStatus};
    use std::sync::atomic::AtomicUsize;

    fn ok_outcome() -> JobResult {
        Ok(JobOutcome::Ingestion(IngestionReport {
            version_number: 1,
            ..Default::default()
        }))
    }

    #[test]
    fn test_executor_creation_and_shutdown() {
        let executor = JobExecutor::new(2).unwrap();
        assert_eq!(executor.worker_count(), 2);
        assert!(!executor.is_shutdown());

        executor.shutdown();
        assert!(executor.is_shutdown());

        executor.wait();
    }

    #[test]
    fn test_zero_workers_means_one() {
        let executor = JobExecutor::new(0).unwrap();
        assert_eq!(executor.worker_count(), 1);
        executor.wait();
    }

    #[test]
    fn test_submit_runs_work_once() {
        let executor = JobExecutor::new(2).unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let handle = executor
            .submit(
                JobHandle::new(JobKind::Ingestion, "records.xml", "alice"),
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ok_outcome()
                }),
            )
            .unwrap();

        assert_eq!(handle.wait(), ok_outcome());
        assert_eq!(handle.status(), JobStatus::Succeeded);
        executor.wait();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_recorded() {
        let executor = JobExecutor::new(1).unwrap();

        let handle = executor
            .submit(
                JobHandle::new(JobKind::Reindex, "reindex", "alice"),
                Box::new(|| -> JobResult {
                    Err(JobFailure::new(FailureKind::NotFound, "nothing archived"))
                }),
            )
            .unwrap();

        let failure = handle.wait().unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert_eq!(handle.status(), JobStatus::Failed);
        executor.wait();
    }

    #[test]
    fn test_panicking_work_fails_job() {
        let executor = JobExecutor::new(1).unwrap();

        let handle = executor
            .submit(
                JobHandle::new(JobKind::Ingestion, "records.xml", "alice"),
                Box::new(|| -> JobResult { panic!("transformer exploded") }),
            )
            .unwrap();

        let failure = handle.wait().unwrap_err();
        assert_eq!(failure.kind, FailureKind::Panic);
        assert!(failure.message.contains("transformer exploded"));

        // The worker survives and keeps serving jobs
        let next = executor
            .submit(
                JobHandle::new(JobKind::Ingestion, "more.xml", "alice"),
                Box::new(ok_outcome),
            )
            .unwrap();
        assert!(next.wait().is_ok());
        executor.wait();
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let executor = JobExecutor::new(1).unwrap();
        executor.shutdown();

        let result = executor.submit(
            JobHandle::new(JobKind::Ingestion, "records.xml", "alice"),
            Box::new(ok_outcome),
        );

        assert!(matches!(result, Err(JobError::ChannelClosed)));
        executor.wait();
    }

    #[test]
    fn test_wait_drains_queued_jobs() {
        let executor = JobExecutor::new(1).unwrap();
        let handles: Vec<JobHandle> = (0..5)
            .map(|i| {
                executor
                    .submit(
                        JobHandle::new(JobKind::Ingestion, format!("batch-{}", i), "alice"),
                        Box::new(|| {
                            thread::sleep(Duration::from_millis(5));
                            ok_outcome()
                        }),
                    )
                    .unwrap()
            })
            .collect();

        executor.wait();

        assert!(handles.iter().all(|h| h.status() == JobStatus::Succeeded));
    }

    #[test]
    fn test_progress_events_bracket_the_job() {
        let broadcaster = JobProgressBroadcaster::new(16);
        let mut rx = broadcaster.subscribe();
        let executor = JobExecutor::with_progress(1, Some(broadcaster)).unwrap();

        let handle = executor
            .submit(
                JobHandle::new(JobKind::Ingestion, "records.xml", "alice"),
                Box::new(ok_outcome),
            )
            .unwrap();
        handle.wait().unwrap();
        executor.wait();

        let mut phases = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.job_id, handle.id());
            phases.push(event.phase);
        }
        assert_eq!(
            phases,
            vec![JobPhase::Queued, JobPhase::Started, JobPhase::Completed]
        );
    }
}
