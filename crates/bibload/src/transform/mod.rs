pub mod command;
pub mod uncompress;

use std::path::Path;

use crate::error::TransformError;
use crate::institution::Institution;

pub use command::CommandTransformer;
pub use uncompress::Uncompressor;

/// Messages a transformer emitted while running. Non-fatal warnings end up
/// here and are reported back to the submitting user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOutput {
    pub messages: Vec<String>,
}

impl TransformOutput {
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }
}

/// One stage of the conversion from an institution's upload to index documents.
pub trait TransformStrategy: Send + Sync {
    fn transform(
        &self,
        input: &Path,
        output: &Path,
        institution: &Institution,
    ) -> Result<TransformOutput, TransformError>;

    fn name(&self) -> &str;
}

/// Identity transformation for institutions that already deliver the
/// target format.
#[derive(Debug, Default)]
pub struct CopyTransformer;

impl CopyTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl TransformStrategy for CopyTransformer {
    fn transform(
        &self,
        input: &Path,
        output: &Path,
        _institution: &Institution,
    ) -> Result<TransformOutput, TransformError> {
        let content = std::fs::read(input).map_err(|e| TransformError::ReadInput {
            path: input.to_path_buf(),
            source: e,
        })?;
        std::fs::write(output, content).map_err(|e| TransformError::WriteOutput {
            path: output.to_path_buf(),
            source: e,
        })?;
        Ok(TransformOutput::default())
    }

    fn name(&self) -> &str {
        "copy"
    }
}
