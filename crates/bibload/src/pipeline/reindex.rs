use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::archive::{ArchiveStore, VersionSelector};
use crate::error::ArchiveError;
use crate::index::{IndexCore, IndexUpdater};
use crate::institution::Institution;
use crate::job::{JobPhase, ReindexReport, ReplayedRequest};
use crate::transform::Uncompressor;
use crate::working_area::{ProcessStep, WorkingArea, WorkingAreaGuard};

use super::error::{ReindexError, ReindexFailure, ReplayProgress};
use super::progress::{phase, ProgressEvent, ProgressReporter};
use super::InstitutionLocks;

/// Rebuilds an institution's index content from its latest archived
/// version: delete, replay the base artifact, then every update in order.
pub struct ReindexOrchestrator {
    working_area: WorkingArea,
    uncompressor: Uncompressor,
    updater: IndexUpdater,
    archive: Arc<dyn ArchiveStore>,
    locks: Arc<InstitutionLocks>,
}

impl ReindexOrchestrator {
    pub fn new(
        working_area: WorkingArea,
        archive: Arc<dyn ArchiveStore>,
        locks: Arc<InstitutionLocks>,
    ) -> Self {
        Self {
            working_area,
            uncompressor: Uncompressor::new(),
            updater: IndexUpdater::new(),
            archive,
            locks,
        }
    }

    pub fn reindex(
        &self,
        job_key: &str,
        core: &IndexCore,
        institution: &Institution,
        progress: &dyn ProgressReporter,
    ) -> Result<ReindexReport, ReindexError> {
        let _span = info_span!("reindex",
            job_id = %job_key,
            core = core.name(),
            institution = institution.id(),
        )
        .entered();

        let guard = self
            .working_area
            .acquire(job_key)
            .map_err(|e| ReindexError::new(ReplayProgress::default(), e))?;

        let mut replay = ReplayProgress::default();
        let result = self.locks.with_lock(core.name(), institution.id(), || {
            self.replay(core, institution, &guard, &mut replay, progress)
        });

        phase(progress, JobPhase::Cleanup, "Removing working files...");
        if let Err(e) = guard.release() {
            warn!("Failed to clean up working area: {}", e);
        }

        match result {
            Ok(report) => {
                info!("Reindexed up to {}", report.label());
                Ok(report)
            }
            Err(e) => {
                warn!("Reindex stopped after applying {}: {}", replay, e);
                Err(e)
            }
        }
    }

    /// Deletes the institution and replays its latest archived version.
    /// The caller holds the institution lock.
    pub(super) fn replay(
        &self,
        core: &IndexCore,
        institution: &Institution,
        guard: &WorkingAreaGuard<'_>,
        replay: &mut ReplayProgress,
        progress: &dyn ProgressReporter,
    ) -> Result<ReindexReport, ReindexError> {
        let version = self
            .archive
            .get_version(core.name(), institution.id(), VersionSelector::Latest)
            .map_err(|e| ReindexError::new(*replay, e))?;
        replay.version = Some(version.version_number);
        debug!(
            "Replaying version {} with {} updates",
            version.version_number,
            version.updates.len()
        );

        {
            let _step = info_span!("delete_institution").entered();
            phase(
                progress,
                JobPhase::DeletingFromIndex,
                format!("Deleting {} from core {}...", institution.id(), core.name()),
            );
            self.updater
                .delete_institution(core, institution)
                .map_err(|e| ReindexError::new(*replay, e))?;
        }

        let replay_dir = guard
            .folder(ProcessStep::SolrFormat)
            .map_err(|e| ReindexError::new(*replay, e))?;
        let mut requests = Vec::with_capacity(version.updates.len() + 1);

        {
            let label = format!("{}.0", version.version_number);
            let _step = info_span!("replay", artifact = %label).entered();
            let response = self
                .apply(core, &version.artifact, &replay_dir)
                .map_err(|e| ReindexError::new(*replay, e))?;
            replay.base_applied = true;
            progress.report(ProgressEvent::Replayed {
                label: label.clone(),
            });
            requests.push(ReplayedRequest { label, response });
        }

        for update in &version.updates {
            let label = format!("{}.{}", version.version_number, update.update_number);
            let _step = info_span!("replay", artifact = %label).entered();
            let response = self
                .apply(core, &update.artifact, &replay_dir)
                .map_err(|e| ReindexError::new(*replay, e))?;
            replay.last_update = Some(update.update_number);
            progress.report(ProgressEvent::Replayed {
                label: label.clone(),
            });
            requests.push(ReplayedRequest { label, response });
        }

        Ok(ReindexReport {
            core: core.name().to_string(),
            institution_id: institution.id().to_string(),
            version_number: version.version_number,
            last_update: version.latest_update_number(),
            requests,
        })
    }

    /// Uncompresses one archived artifact and sends it to the index.
    fn apply(
        &self,
        core: &IndexCore,
        artifact: &Path,
        replay_dir: &Path,
    ) -> Result<String, ReindexFailure> {
        let extracted = self.uncompressor.uncompress_file(artifact, replay_dir)?;
        let response = self.updater.upload(core, &extracted);
        if let Err(e) = std::fs::remove_file(&extracted) {
            debug!("Could not remove replayed artifact: {}", e);
        }
        Ok(response?)
    }

    /// Whether anything is archived for the institution on `core`.
    pub fn has_archive(&self, core: &str, institution_id: &str) -> Result<bool, ArchiveError> {
        Ok(!self.archive.list_versions(core, institution_id)?.is_empty())
    }
}
