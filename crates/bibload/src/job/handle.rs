use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::job::model::{JobKind, JobResult, JobStatus};

struct JobState {
    status: JobStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    result: Option<JobResult>,
}

struct JobInner {
    id: String,
    name: String,
    user: String,
    kind: JobKind,
    created_at: DateTime<Utc>,
    state: Mutex<JobState>,
    finished: Condvar,
}

/// Shared view of a submitted job. Cloning is cheap and every clone sees
/// the same state.
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<JobInner>,
}

impl JobHandle {
    /// Creates a job with a fresh UUID, which is also its working-area key.
    pub fn new<N: Into<String>, U: Into<String>>(kind: JobKind, name: N, user: U) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), kind, name, user)
    }

    pub fn with_id<I, N, U>(id: I, kind: JobKind, name: N, user: U) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        U: Into<String>,
    {
        Self {
            inner: Arc::new(JobInner {
                id: id.into(),
                name: name.into(),
                user: user.into(),
                kind,
                created_at: Utc::now(),
                state: Mutex::new(JobState {
                    status: JobStatus::Created,
                    started_at: None,
                    finished_at: None,
                    result: None,
                }),
                finished: Condvar::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn user(&self) -> &str {
        &self.inner.user
    }

    pub fn kind(&self) -> JobKind {
        self.inner.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub fn status(&self) -> JobStatus {
        self.state().status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state().started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.state().finished_at
    }

    /// The terminal result, once there is one.
    pub fn outcome(&self) -> Option<JobResult> {
        self.state().result.clone()
    }

    /// Report text for the user. Empty while the job hasn't finished.
    pub fn report(&self) -> String {
        match self.state().result.as_ref() {
            Some(Ok(outcome)) => outcome.report(),
            Some(Err(failure)) => failure.to_string(),
            None => String::new(),
        }
    }

    /// Blocks until the job is terminal.
    pub fn wait(&self) -> JobResult {
        let mut state = self.state();
        loop {
            if let Some(result) = state.result.as_ref() {
                return result.clone();
            }
            state = self
                .inner
                .finished
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Like [`JobHandle::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobResult> {
        let state = self.state();
        let (state, _) = self
            .inner
            .finished
            .wait_timeout_while(state, timeout, |s| s.result.is_none())
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.result.clone()
    }

    pub(crate) fn mark_running(&self) {
        let mut state = self.state();
        if state.status == JobStatus::Created {
            state.status = JobStatus::Running;
            state.started_at = Some(Utc::now());
        }
    }

    /// Stores the terminal result. Only the first call has any effect;
    /// returns whether this call was it.
    pub(crate) fn complete(&self, result: JobResult) -> bool {
        let mut state = self.state();
        if state.result.is_some() {
            return false;
        }
        state.status = if result.is_ok() {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };
        if state.started_at.is_none() {
            state.started_at = Some(Utc::now());
        }
        state.finished_at = Some(Utc::now());
        state.result = Some(result);
        drop(state);
        self.inner.finished.notify_all();
        true
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("status", &self.status())
            .finish()
    }
}
