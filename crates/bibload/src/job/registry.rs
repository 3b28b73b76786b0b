use std::sync::RwLock;

use crate::error::NotFoundError;
use crate::job::handle::JobHandle;

/// In-memory record of every job submitted during this process's lifetime.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<Vec<JobHandle>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: JobHandle) {
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.push(handle);
        }
    }

    pub fn get(&self, id: &str) -> Result<JobHandle, NotFoundError> {
        self.jobs
            .read()
            .ok()
            .and_then(|jobs| jobs.iter().find(|j| j.id() == id).cloned())
            .ok_or_else(|| NotFoundError::Job(id.to_string()))
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<JobHandle> {
        self.jobs
            .read()
            .map(|jobs| jobs.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::model::{FailureKind, JobFailure, JobKind, JobStatus};

    #[test]
    fn test_lookup_and_listing() {
        let registry = JobRegistry::new();
        let first = JobHandle::new(JobKind::Ingestion, "first.xml", "alice");
        let second = JobHandle::new(JobKind::Reindex, "reindex", "bob");
        registry.insert(first.clone());
        registry.insert(second.clone());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(first.id()).unwrap().name(), "first.xml");

        let ids: Vec<String> = registry.list().iter().map(|j| j.id().to_string()).collect();
        assert_eq!(ids, vec![second.id().to_string(), first.id().to_string()]);
    }

    #[test]
    fn test_unknown_job() {
        let registry = JobRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(registry.get("nope"), Err(NotFoundError::Job(_))));
    }

    #[test]
    fn test_registry_sees_live_status() {
        let registry = JobRegistry::new();
        let job = JobHandle::new(JobKind::Ingestion, "records.xml", "alice");
        registry.insert(job.clone());
        assert_eq!(registry.get(job.id()).unwrap().status(), JobStatus::Created);

        job.complete(Err(JobFailure::new(FailureKind::Transform, "bad xslt")));

        assert_eq!(registry.get(job.id()).unwrap().status(), JobStatus::Failed);
    }
}
