//! Test harness for isolated service execution.
//!
//! Every harness owns a temp directory with `incoming/`, `work/` and
//! `archive/`, and an `IngestService` whose single core `live` writes to a
//! `RecordingIndex` instead of a search server.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use bibload::error::IndexError;
use bibload::index::{CoreRegistry, IndexClient, IndexCore};
use bibload::institution::{Institution, InstitutionRegistry};
use bibload::job::{JobHandle, JobResult};
use bibload::transform::{CopyTransformer, TransformStrategy};
use bibload::{FileArchiveStore, IngestService, WorkingArea};

pub const CORE: &str = "live";
pub const USER: &str = "alice";
const JOB_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCall {
    /// Content of the uploaded artifact.
    Update(String),
    Delete(String),
}

/// Index client that records every call instead of talking to a server.
#[derive(Default)]
pub struct RecordingIndex {
    calls: Mutex<Vec<IndexCall>>,
    reject_updates: Mutex<bool>,
    reject_next: Mutex<usize>,
}

impl RecordingIndex {
    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn reject_updates(&self, reject: bool) {
        *self.reject_updates.lock().unwrap() = reject;
    }

    /// Rejects only the next `count` updates.
    pub fn reject_next_updates(&self, count: usize) {
        *self.reject_next.lock().unwrap() = count;
    }

    fn rejects_update(&self) -> bool {
        let mut next = self.reject_next.lock().unwrap();
        if *next > 0 {
            *next -= 1;
            return true;
        }
        *self.reject_updates.lock().unwrap()
    }
}

impl IndexClient for RecordingIndex {
    fn update(&self, artifact: &Path) -> Result<String, IndexError> {
        if self.rejects_update() {
            return Err(IndexError::Rejected {
                core: CORE.to_string(),
                status: 503,
                body: "core is reloading".to_string(),
            });
        }
        let content = std::fs::read_to_string(artifact).map_err(|e| IndexError::ReadArtifact {
            path: artifact.to_path_buf(),
            source: e,
        })?;
        self.calls.lock().unwrap().push(IndexCall::Update(content));
        Ok("<response><int name=\"status\">0</int></response>".to_string())
    }

    fn delete_institution(&self, institution_id: &str) -> Result<(), IndexError> {
        self.calls
            .lock()
            .unwrap()
            .push(IndexCall::Delete(institution_id.to_string()));
        Ok(())
    }
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub incoming_dir: PathBuf,
    pub work_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub index: Arc<RecordingIndex>,
    pub service: IngestService,
}

impl TestHarness {
    /// Harness with institutions `ub-a` and `ub-b`, both using the copy
    /// transformation.
    pub fn new() -> Self {
        let copy: Arc<dyn TransformStrategy> = Arc::new(CopyTransformer::new());
        Self::with_institutions(vec![("ub-a", copy.clone()), ("ub-b", copy)])
    }

    pub fn with_institutions(institutions: Vec<(&str, Arc<dyn TransformStrategy>)>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let incoming_dir = base.join("incoming");
        let work_dir = base.join("work");
        let archive_dir = base.join("archive");
        std::fs::create_dir_all(&incoming_dir).expect("Failed to create incoming dir");

        let index = Arc::new(RecordingIndex::default());
        let mut cores = CoreRegistry::new();
        cores.register(IndexCore::new(CORE, index.clone()));

        let mut registry = InstitutionRegistry::new();
        for (id, strategy) in institutions {
            registry.register(Institution::new(id, id.to_uppercase(), strategy));
        }

        let service = IngestService::new(
            WorkingArea::new(&work_dir),
            Arc::new(FileArchiveStore::new(&archive_dir)),
            Arc::new(CopyTransformer::new()),
            registry,
            cores,
            2,
        )
        .expect("Failed to start service");

        Self {
            temp_dir,
            incoming_dir,
            work_dir,
            archive_dir,
            index,
            service,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes an upload into the incoming directory.
    pub fn write_upload(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.incoming_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write upload");
        path
    }

    /// Submits an upload and waits for the job to finish.
    pub fn ingest(
        &self,
        institution: &str,
        filename: &str,
        content: &str,
        incremental: bool,
    ) -> (JobHandle, JobResult) {
        let input = self.write_upload(filename, content.as_bytes());
        let job = self
            .service
            .submit_ingestion(input, institution, CORE, Some(filename), incremental, USER)
            .expect("Failed to submit ingestion");
        let result = wait(&job);
        (job, result)
    }

    pub fn reindex(&self, institution: &str) -> (JobHandle, JobResult) {
        let job = self
            .service
            .submit_reindex(CORE, institution, USER)
            .expect("Failed to submit reindex");
        let result = wait(&job);
        (job, result)
    }

    /// True if no job left anything in the working directory.
    pub fn work_dir_is_empty(&self) -> bool {
        match std::fs::read_dir(&self.work_dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    pub fn incoming_is_empty(&self) -> bool {
        std::fs::read_dir(&self.incoming_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

pub fn wait(job: &JobHandle) -> JobResult {
    job.wait_timeout(JOB_TIMEOUT)
        .unwrap_or_else(|| panic!("Job {} did not finish in time", job.id()))
}
