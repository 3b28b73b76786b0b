//! Doubles shared by the orchestrator tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{IndexError, TransformError};
use crate::index::{IndexClient, IndexCore};
use crate::institution::Institution;
use crate::transform::{CopyTransformer, TransformOutput, TransformStrategy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCall {
    /// Content of the uploaded artifact.
    Update(String),
    Delete(String),
}

/// Index client recording every call. Optionally rejects the n-th update
/// (zero-based).
#[derive(Default)]
pub struct RecordingIndex {
    calls: Mutex<Vec<IndexCall>>,
    updates: AtomicUsize,
    fail_update_at: Option<usize>,
}

impl RecordingIndex {
    pub fn failing_at(update: usize) -> Self {
        Self {
            fail_update_at: Some(update),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl IndexClient for RecordingIndex {
    fn update(&self, artifact: &Path) -> Result<String, IndexError> {
        let n = self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_update_at == Some(n) {
            return Err(IndexError::Rejected {
                core: "live".to_string(),
                status: 500,
                body: "index unavailable".to_string(),
            });
        }
        let content = std::fs::read_to_string(artifact).map_err(|e| IndexError::ReadArtifact {
            path: artifact.to_path_buf(),
            source: e,
        })?;
        self.calls.lock().unwrap().push(IndexCall::Update(content));
        Ok(format!("ok {}", n))
    }

    fn delete_institution(&self, institution_id: &str) -> Result<(), IndexError> {
        self.calls
            .lock()
            .unwrap()
            .push(IndexCall::Delete(institution_id.to_string()));
        Ok(())
    }
}

/// Copies input to output and reports a fixed warning.
pub struct WarningTransformer(pub &'static str);

impl TransformStrategy for WarningTransformer {
    fn transform(
        &self,
        input: &Path,
        output: &Path,
        institution: &Institution,
    ) -> Result<TransformOutput, TransformError> {
        CopyTransformer::new().transform(input, output, institution)?;
        Ok(TransformOutput::new(vec![self.0.to_string()]))
    }

    fn name(&self) -> &str {
        "warning"
    }
}

/// Always fails, with diagnostics.
pub struct FailingTransformer;

impl TransformStrategy for FailingTransformer {
    fn transform(
        &self,
        _input: &Path,
        _output: &Path,
        _institution: &Institution,
    ) -> Result<TransformOutput, TransformError> {
        Err(TransformError::Exit {
            program: "xsltproc".to_string(),
            status: "exit status: 6".to_string(),
            diagnostics: vec!["line 3: unexpected element".to_string()],
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

pub fn institution(strategy: Arc<dyn TransformStrategy>) -> Institution {
    Institution::new("ub-a", "UB A", strategy)
}

pub fn core(index: Arc<RecordingIndex>) -> IndexCore {
    IndexCore::new("live", index)
}
