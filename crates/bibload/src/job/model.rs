use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

/// Lifecycle of a job. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Created => write!(f, "created"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Ingestion,
    Reindex,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Ingestion => write!(f, "ingestion"),
            JobKind::Reindex => write!(f, "reindex"),
        }
    }
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub version_number: u32,
    pub update_number: Option<u32>,
    pub working_format_messages: Vec<String>,
    pub index_format_messages: Vec<String>,
    pub index_response: String,
}

/// One index request issued during a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayedRequest {
    /// `version.update`, update `0` being the base artifact.
    pub label: String,
    pub response: String,
}

/// Result of a successful reindex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexReport {
    pub core: String,
    pub institution_id: String,
    pub version_number: u32,
    pub last_update: Option<u32>,
    pub requests: Vec<ReplayedRequest>,
}

impl ReindexReport {
    /// `version.update` of the newest replayed artifact.
    pub fn label(&self) -> String {
        format!("{}.{}", self.version_number, self.last_update.unwrap_or(0))
    }
}

/// Writes stage diagnostics in the layout users get back with their job.
pub fn render_diagnostics(
    out: &mut String,
    working_format_messages: &[String],
    index_format_messages: &[String],
) {
    if !working_format_messages.is_empty() {
        out.push_str("Working format messages:\n");
        for message in working_format_messages {
            let _ = writeln!(out, "  {}", message);
        }
    }
    if !index_format_messages.is_empty() {
        out.push_str("Index format messages:\n");
        for message in index_format_messages {
            let _ = writeln!(out, "  {}", message);
        }
    }
}

/// Typed result of a finished unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOutcome {
    Ingestion(IngestionReport),
    Reindex(ReindexReport),
}

impl JobOutcome {
    /// Human-readable summary handed back to the submitting user.
    pub fn report(&self) -> String {
        let mut out = String::new();
        match self {
            JobOutcome::Ingestion(report) => {
                match report.update_number {
                    Some(update) => {
                        let _ = writeln!(
                            out,
                            "Archived as update {} of version {}",
                            update, report.version_number
                        );
                    }
                    None => {
                        let _ = writeln!(out, "Archived as version {}", report.version_number);
                    }
                }
                render_diagnostics(
                    &mut out,
                    &report.working_format_messages,
                    &report.index_format_messages,
                );
                if !report.index_response.is_empty() {
                    let _ = writeln!(out, "Index response: {}", report.index_response.trim());
                }
            }
            JobOutcome::Reindex(report) => {
                let _ = writeln!(
                    out,
                    "Reindexed {} on core {} up to {}",
                    report.institution_id,
                    report.core,
                    report.label()
                );
                for request in &report.requests {
                    let _ = writeln!(out, "  {}: {}", request.label, request.response.trim());
                }
            }
        }
        out
    }
}

/// Kind of error that ended a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transform,
    Uncompress,
    Index,
    Archive,
    NotFound,
    WorkingArea,
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transform => write!(f, "transform"),
            FailureKind::Uncompress => write!(f, "uncompress"),
            FailureKind::Index => write!(f, "index"),
            FailureKind::Archive => write!(f, "archive"),
            FailureKind::NotFound => write!(f, "not found"),
            FailureKind::WorkingArea => write!(f, "working area"),
            FailureKind::Panic => write!(f, "panic"),
        }
    }
}

/// A failed unit of work, with whatever report had accumulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
    pub report: String,
}

impl JobFailure {
    pub fn new<M: Into<String>>(kind: FailureKind, message: M) -> Self {
        Self {
            kind,
            message: message.into(),
            report: String::new(),
        }
    }

    pub fn with_report<R: Into<String>>(mut self, report: R) -> Self {
        self.report = report.into();
        self
    }

    pub fn panic(message: &str) -> Self {
        Self::new(FailureKind::Panic, format!("Job panicked: {}", message))
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)?;
        if !self.report.is_empty() {
            write!(f, "\n{}", self.report.trim_end())?;
        }
        Ok(())
    }
}

pub type JobResult = Result<JobOutcome, JobFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_report_text() {
        let outcome = JobOutcome::Ingestion(IngestionReport {
            version_number: 4,
            update_number: Some(2),
            working_format_messages: vec!["record 7: missing title".to_string()],
            index_format_messages: vec![],
            index_response: "<response>ok</response>\n".to_string(),
        });

        let report = outcome.report();

        assert!(report.starts_with("Archived as update 2 of version 4\n"));
        assert!(report.contains("Working format messages:\n  record 7: missing title\n"));
        assert!(!report.contains("Index format messages"));
        assert!(report.contains("Index response: <response>ok</response>"));
    }

    #[test]
    fn test_reindex_report_text() {
        let outcome = JobOutcome::Reindex(ReindexReport {
            core: "live".to_string(),
            institution_id: "ub-a".to_string(),
            version_number: 3,
            last_update: Some(1),
            requests: vec![
                ReplayedRequest {
                    label: "3.0".to_string(),
                    response: "ok".to_string(),
                },
                ReplayedRequest {
                    label: "3.1".to_string(),
                    response: "ok".to_string(),
                },
            ],
        });

        assert_eq!(
            outcome.report(),
            "Reindexed ub-a on core live up to 3.1\n  3.0: ok\n  3.1: ok\n"
        );
    }

    #[test]
    fn test_failure_display() {
        let failure = JobFailure::new(FailureKind::Index, "core rejected the update")
            .with_report("Working format messages:\n  warn\n");
        assert_eq!(
            failure.to_string(),
            "index error: core rejected the update\nWorking format messages:\n  warn"
        );
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let outcome = JobOutcome::Ingestion(IngestionReport::default());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "ingestion");
    }

    #[test]
    fn test_terminal_status() {
        assert!(!JobStatus::Created.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
