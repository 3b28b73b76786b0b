use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::archive::{ArchiveReceipt, ArchiveRequest, ArchiveStore, VersionOrigin};
use crate::error::{ArchiveError, IndexError};
use crate::index::{IndexCore, IndexUpdater};
use crate::institution::Institution;
use crate::job::{FailureKind, IngestionReport, JobPhase};
use crate::sanitize;
use crate::transform::{TransformStrategy, Uncompressor};
use crate::working_area::{ProcessStep, WorkingArea, WorkingAreaGuard};

use super::error::{PipelineError, ReplayProgress};
use super::progress::{phase, ProgressReporter};
use super::reindex::ReindexOrchestrator;
use super::request::TransformationRequest;
use super::InstitutionLocks;

/// Runs one ingestion: uncompress, two transformations, index, archive.
pub struct ProcessOrchestrator {
    working_area: WorkingArea,
    uncompressor: Uncompressor,
    index_format: Arc<dyn TransformStrategy>,
    updater: IndexUpdater,
    archive: Arc<dyn ArchiveStore>,
    locks: Arc<InstitutionLocks>,
    restorer: ReindexOrchestrator,
}

impl ProcessOrchestrator {
    pub fn new(
        working_area: WorkingArea,
        index_format: Arc<dyn TransformStrategy>,
        archive: Arc<dyn ArchiveStore>,
        locks: Arc<InstitutionLocks>,
    ) -> Self {
        let restorer =
            ReindexOrchestrator::new(working_area.clone(), Arc::clone(&archive), Arc::clone(&locks));
        Self {
            working_area,
            uncompressor: Uncompressor::new(),
            index_format,
            updater: IndexUpdater::new(),
            archive,
            locks,
            restorer,
        }
    }

    /// Processes `request` end to end. The working area and the input file
    /// are removed whatever the outcome; the request keeps every diagnostic
    /// gathered up to the point of failure.
    pub fn process(
        &self,
        request: &mut TransformationRequest,
        institution: &Institution,
        core: &IndexCore,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestionReport, PipelineError> {
        let filename = sanitize::redact_path(&request.input);
        let _pipeline_span = info_span!("ingest",
            job_id = %request.job_key,
            core = core.name(),
            institution = institution.id(),
            filename = %filename,
            incremental = request.incremental,
        )
        .entered();

        let mut guard = match self.working_area.acquire(&request.job_key) {
            Ok(guard) => guard,
            Err(e) => {
                discard_input(&request.input);
                return Err(e.into());
            }
        };
        guard.remove_on_release(&request.input);

        let result = self.run_steps(request, institution, core, &guard, progress);

        {
            let _step = info_span!("cleanup").entered();
            phase(progress, JobPhase::Cleanup, "Removing working files...");
            if let Err(e) = guard.release() {
                warn!("Failed to clean up working area: {}", e);
            }
        }

        match result {
            Ok(receipt) => Ok(request.report_for(&receipt)),
            Err(e) => {
                warn!(stage = e.stage(), "Ingestion failed: {}", e);
                Err(e)
            }
        }
    }

    fn run_steps(
        &self,
        request: &mut TransformationRequest,
        institution: &Institution,
        core: &IndexCore,
        guard: &WorkingAreaGuard<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<ArchiveReceipt, PipelineError> {
        // Step 1: Uncompress
        let uploaded = {
            let _step = info_span!("uncompress").entered();
            phase(progress, JobPhase::Uncompressing, "Uncompressing upload...");
            let upload_dir = guard.folder(ProcessStep::Upload)?;
            self.uncompressor.uncompress_file(&request.input, &upload_dir)?
        };

        // Step 2: Working format
        let working = {
            let _step = info_span!("working_format", strategy = institution.strategy().name())
                .entered();
            phase(
                progress,
                JobPhase::TransformingToWorkingFormat,
                "Transforming to working format...",
            );
            let output = output_path(&guard.folder(ProcessStep::WorkingFormat)?, &uploaded);
            match institution.strategy().transform(&uploaded, &output, institution) {
                Ok(out) => request.working_format_messages = out.messages,
                Err(e) => {
                    request.working_format_messages = e.diagnostics().to_vec();
                    return Err(PipelineError::WorkingFormat(e));
                }
            }
            debug!("{} working format messages", request.working_format_messages.len());
            output
        };

        // Step 3: Index format
        let index_input = {
            let _step = info_span!("index_format", strategy = self.index_format.name()).entered();
            phase(
                progress,
                JobPhase::TransformingToIndexFormat,
                "Transforming to index format...",
            );
            let output = output_path(&guard.folder(ProcessStep::SolrFormat)?, &working);
            match self.index_format.transform(&working, &output, institution) {
                Ok(out) => request.index_format_messages = out.messages,
                Err(e) => {
                    request.index_format_messages = e.diagnostics().to_vec();
                    return Err(PipelineError::IndexFormat(e));
                }
            }
            request.index_input = Some(output.clone());
            output
        };

        // Steps 4+5: Index and archive, exclusive per (core, institution)
        self.locks
            .with_lock(core.name(), institution.id(), || -> Result<_, PipelineError> {
                // An update the archive cannot take must not reach the index
                if request.incremental
                    && self
                        .archive
                        .list_versions(core.name(), institution.id())?
                        .is_empty()
                {
                    return Err(ArchiveError::NoBaseVersion {
                        core: core.name().to_string(),
                        institution: institution.id().to_string(),
                    }
                    .into());
                }

                {
                    let _step = info_span!("index").entered();
                    phase(
                        progress,
                        JobPhase::Indexing,
                        format!("Updating index core {}...", core.name()),
                    );
                    match self
                        .updater
                        .apply(core, institution, &index_input, request.incremental)
                    {
                        Ok(response) => request.index_response = Some(response),
                        Err(e @ IndexError::Replace { .. }) => {
                            request.index_restore =
                                Some(self.restore(core, institution, guard, progress));
                            return Err(e.into());
                        }
                        Err(e) => return Err(e.into()),
                    }
                }

                let _step = info_span!("archive").entered();
                phase(progress, JobPhase::Archiving, "Archiving index artifact...");
                let receipt = self.archive.archive(&ArchiveRequest {
                    artifact: &index_input,
                    core: core.name(),
                    institution_id: institution.id(),
                    incremental: request.incremental,
                    origin: VersionOrigin::Upload,
                    user: &request.user,
                    original_file_name: request.original_file_name.as_deref(),
                })?;
                info!("Archived as {}", receipt);
                request.archive_receipt = Some(receipt.clone());
                Ok(receipt)
            })
    }

    /// Puts the latest archived version back after a full replacement
    /// deleted the institution and then failed. Returns the note for the
    /// job report.
    fn restore(
        &self,
        core: &IndexCore,
        institution: &Institution,
        guard: &WorkingAreaGuard<'_>,
        progress: &dyn ProgressReporter,
    ) -> String {
        let _step = info_span!("restore").entered();
        phase(
            progress,
            JobPhase::Replaying,
            format!("Restoring {} from the archive...", institution.id()),
        );

        let mut replay = ReplayProgress::default();
        match self
            .restorer
            .replay(core, institution, guard, &mut replay, progress)
        {
            Ok(report) => {
                info!("Restored index content from archived {}", report.label());
                format!(
                    "Institution content was deleted from the index and restored from version {}",
                    report.label()
                )
            }
            Err(e) if e.failure_kind() == FailureKind::NotFound => {
                warn!("Nothing archived to restore the index from");
                "Institution content was deleted from the index; nothing archived to restore it"
                    .to_string()
            }
            Err(e) => {
                warn!("Restoring index content failed: {}", e);
                format!(
                    "Institution content was deleted from the index; restore stopped after {}: {}. Reindex required",
                    e.progress, e.source
                )
            }
        }
    }
}

fn discard_input(input: &Path) {
    if let Err(e) = std::fs::remove_file(input) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove input {}: {}", sanitize::redact_path(input), e);
        }
    }
}

/// Output of a step keeps the input's file name, in the step's folder.
fn output_path(step_dir: &Path, input: &Path) -> PathBuf {
    match input.file_name() {
        Some(name) => step_dir.join(name),
        None => step_dir.join("records.xml"),
    }
}
