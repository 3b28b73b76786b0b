//! Entry point for callers: submits ingestion and reindex jobs and gives
//! access to their state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::archive::{ArchiveReceipt, ArchiveRequest, ArchiveStore, FileArchiveStore, VersionOrigin};
use crate::config::Config;
use crate::error::Result;
use crate::index::{CoreRegistry, IndexCore, SolrClient};
use crate::institution::{Institution, InstitutionRegistry};
use crate::job::{
    JobExecutor, JobFailure, JobHandle, JobKind, JobOutcome, JobProgressBroadcaster,
    JobProgressEvent, JobProgressTracker, JobRegistry,
};
use crate::pipeline::{
    BroadcastProgress, InstitutionLocks, ProcessOrchestrator, ReindexOrchestrator,
    TransformationRequest,
};
use crate::sanitize;
use crate::transform::TransformStrategy;
use crate::working_area::WorkingArea;

const PROGRESS_CAPACITY: usize = 256;

pub struct IngestService {
    institutions: InstitutionRegistry,
    cores: CoreRegistry,
    archive: Arc<dyn ArchiveStore>,
    locks: Arc<InstitutionLocks>,
    process: Arc<ProcessOrchestrator>,
    reindex: Arc<ReindexOrchestrator>,
    executor: JobExecutor,
    jobs: JobRegistry,
    progress: JobProgressBroadcaster,
}

impl IngestService {
    /// Production constructor: Solr cores, file archive and worker pool as
    /// configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut cores = CoreRegistry::new();
        for core in &config.cores {
            let client = SolrClient::new(&core.name, &core.url, &core.institution_field)?;
            cores.register(IndexCore::new(core.name.clone(), Arc::new(client)));
        }

        let mut institutions = InstitutionRegistry::new();
        for institution in &config.institutions {
            institutions.register(Institution::new(
                institution.id.clone(),
                institution.name.clone(),
                institution.transform.build(),
            ));
        }

        info!(
            cores = config.cores.len(),
            institutions = config.institutions.len(),
            workers = config.worker_count,
            "Starting ingest service"
        );

        Self::new(
            WorkingArea::new(&config.working_directory),
            Arc::new(FileArchiveStore::new(&config.archive_directory)),
            config.index_format.build(),
            institutions,
            cores,
            config.worker_count,
        )
    }

    /// Assembles a service from ready-made parts.
    pub fn new(
        working_area: WorkingArea,
        archive: Arc<dyn ArchiveStore>,
        index_format: Arc<dyn TransformStrategy>,
        institutions: InstitutionRegistry,
        cores: CoreRegistry,
        worker_count: usize,
    ) -> Result<Self> {
        let locks = Arc::new(InstitutionLocks::new());
        let progress = JobProgressBroadcaster::new(PROGRESS_CAPACITY);

        let process = Arc::new(ProcessOrchestrator::new(
            working_area.clone(),
            index_format,
            Arc::clone(&archive),
            Arc::clone(&locks),
        ));
        let reindex = Arc::new(ReindexOrchestrator::new(
            working_area,
            Arc::clone(&archive),
            Arc::clone(&locks),
        ));
        let executor = JobExecutor::with_progress(worker_count, Some(progress.clone()))?;

        Ok(Self {
            institutions,
            cores,
            archive,
            locks,
            process,
            reindex,
            executor,
            jobs: JobRegistry::new(),
            progress,
        })
    }

    /// Queues an upload for ingestion. Once the institution and core are
    /// known, `input` is owned by the job and deleted when it ends, or right
    /// away if the job cannot be queued.
    pub fn submit_ingestion(
        &self,
        input: PathBuf,
        institution_id: &str,
        core: &str,
        original_file_name: Option<&str>,
        incremental: bool,
        user: &str,
    ) -> Result<JobHandle> {
        let institution = self.institutions.get(institution_id)?;
        let index_core = self.cores.get(core)?;

        let name = original_file_name
            .map(str::to_string)
            .unwrap_or_else(|| sanitize::redact_path(&input));
        let handle = JobHandle::new(JobKind::Ingestion, name, user);

        let mut request = TransformationRequest::new(
            handle.id(),
            core,
            institution_id,
            input.clone(),
            incremental,
            user,
        )
        .with_original_file_name(original_file_name);
        let process = Arc::clone(&self.process);
        let progress = self.tracker(&handle);

        let submitted = self.executor.submit(
            handle,
            Box::new(move || {
                match process.process(&mut request, &institution, &index_core, &progress) {
                    Ok(report) => Ok(JobOutcome::Ingestion(report)),
                    Err(e) => Err(JobFailure::new(e.failure_kind(), e.to_string())
                        .with_report(request.diagnostics_report())),
                }
            }),
        );
        let handle = match submitted {
            Ok(handle) => handle,
            Err(e) => {
                discard_upload(&input);
                return Err(e.into());
            }
        };

        self.jobs.insert(handle.clone());
        Ok(handle)
    }

    /// Queues a rebuild of the institution's index content from its latest
    /// archived version.
    pub fn submit_reindex(&self, core: &str, institution_id: &str, user: &str) -> Result<JobHandle> {
        let institution = self.institutions.get(institution_id)?;
        let index_core = self.cores.get(core)?;

        let handle = JobHandle::new(
            JobKind::Reindex,
            format!("reindex {} on {}", institution_id, core),
            user,
        );
        let job_key = handle.id().to_string();
        let reindex = Arc::clone(&self.reindex);
        let progress = self.tracker(&handle);

        let handle = self.executor.submit(
            handle,
            Box::new(move || {
                match reindex.reindex(&job_key, &index_core, &institution, &progress) {
                    Ok(report) => Ok(JobOutcome::Reindex(report)),
                    Err(e) => Err(JobFailure::new(e.failure_kind(), e.to_string())
                        .with_report(format!("Last applied: {}", e.progress))),
                }
            }),
        )?;

        self.jobs.insert(handle.clone());
        Ok(handle)
    }

    /// Queues one reindex per configured institution with anything archived
    /// on `core`.
    pub fn submit_reindex_all(&self, core: &str, user: &str) -> Result<Vec<JobHandle>> {
        self.cores.get(core)?;

        let mut handles = Vec::new();
        for institution in self.institutions.all() {
            if self.reindex.has_archive(core, institution.id())? {
                handles.push(self.submit_reindex(core, institution.id(), user)?);
            }
        }
        info!(core, "Queued {} reindex jobs", handles.len());
        Ok(handles)
    }

    /// Stores an externally produced index-format artifact in the archive
    /// without touching the index.
    pub fn import(
        &self,
        artifact: &Path,
        core: &str,
        institution_id: &str,
        incremental: bool,
        user: &str,
    ) -> Result<ArchiveReceipt> {
        let institution = self.institutions.get(institution_id)?;
        let index_core = self.cores.get(core)?;

        let receipt = self
            .locks
            .with_lock(index_core.name(), institution.id(), || {
                self.archive.archive(&ArchiveRequest {
                    artifact,
                    core: index_core.name(),
                    institution_id: institution.id(),
                    incremental,
                    origin: VersionOrigin::Import,
                    user,
                    original_file_name: artifact.file_name().and_then(|n| n.to_str()),
                })
            })?;
        Ok(receipt)
    }

    pub fn job(&self, id: &str) -> Result<JobHandle> {
        Ok(self.jobs.get(id)?)
    }

    /// All jobs submitted so far, newest first.
    pub fn jobs(&self) -> Vec<JobHandle> {
        self.jobs.list()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.progress.subscribe()
    }

    pub fn archive(&self) -> &dyn ArchiveStore {
        self.archive.as_ref()
    }

    pub fn institutions(&self) -> &InstitutionRegistry {
        &self.institutions
    }

    pub fn cores(&self) -> &CoreRegistry {
        &self.cores
    }

    /// Stops accepting jobs. Queued jobs still run.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    /// Lets queued jobs finish and joins the workers.
    pub fn wait(self) {
        self.executor.wait();
    }

    fn tracker(&self, handle: &JobHandle) -> BroadcastProgress {
        BroadcastProgress::new(JobProgressTracker::new(
            handle.id(),
            handle.name(),
            self.progress.clone(),
        ))
    }
}

fn discard_upload(input: &Path) {
    if let Err(e) = std::fs::remove_file(input) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove upload {}: {}", sanitize::redact_path(input), e);
        }
    }
}
