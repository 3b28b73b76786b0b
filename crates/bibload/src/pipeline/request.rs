use std::fmt::Write;
use std::path::PathBuf;

use crate::archive::ArchiveReceipt;
use crate::job::model::render_diagnostics;
use crate::job::IngestionReport;

/// One ingestion as it moves through the pipeline.
///
/// The identifying fields are set on submission; the remaining ones are
/// filled in by the steps as they complete, so a failed run still carries
/// everything that happened before the failure.
#[derive(Debug, Clone)]
pub struct TransformationRequest {
    /// Job id, used as the working-area key.
    pub job_key: String,
    pub core: String,
    pub institution_id: String,
    /// Uploaded file. Deleted when the job ends.
    pub input: PathBuf,
    pub original_file_name: Option<String>,
    pub incremental: bool,
    pub user: String,

    pub working_format_messages: Vec<String>,
    pub index_format_messages: Vec<String>,
    pub index_input: Option<PathBuf>,
    pub index_response: Option<String>,
    /// What happened to the institution's index content after a failed
    /// full replacement.
    pub index_restore: Option<String>,
    pub archive_receipt: Option<ArchiveReceipt>,
}

impl TransformationRequest {
    pub fn new(
        job_key: &str,
        core: &str,
        institution_id: &str,
        input: PathBuf,
        incremental: bool,
        user: &str,
    ) -> Self {
        Self {
            job_key: job_key.to_string(),
            core: core.to_string(),
            institution_id: institution_id.to_string(),
            input,
            original_file_name: None,
            incremental,
            user: user.to_string(),
            working_format_messages: Vec::new(),
            index_format_messages: Vec::new(),
            index_input: None,
            index_response: None,
            index_restore: None,
            archive_receipt: None,
        }
    }

    pub fn with_original_file_name<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.original_file_name = name.map(Into::into);
        self
    }

    /// Stage diagnostics collected so far, in report form.
    pub fn diagnostics_report(&self) -> String {
        let mut out = String::new();
        render_diagnostics(
            &mut out,
            &self.working_format_messages,
            &self.index_format_messages,
        );
        if let Some(ref restore) = self.index_restore {
            let _ = writeln!(out, "{}", restore);
        }
        out
    }

    pub fn report_for(&self, receipt: &ArchiveReceipt) -> IngestionReport {
        IngestionReport {
            version_number: receipt.version_number,
            update_number: receipt.update_number,
            working_format_messages: self.working_format_messages.clone(),
            index_format_messages: self.index_format_messages.clone(),
            index_response: self.index_response.clone().unwrap_or_default(),
        }
    }
}
