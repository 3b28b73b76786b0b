//! Transformation through an external program, typically `xsltproc` with an
//! institution-specific stylesheet.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::TransformError;
use crate::institution::Institution;
use crate::transform::{TransformOutput, TransformStrategy};

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";
const INSTITUTION_PLACEHOLDER: &str = "{institution}";

/// Runs `program` with `args`, substituting `{input}`, `{output}` and
/// `{institution}`. Every non-empty stderr line becomes a diagnostic message.
#[derive(Debug, Clone)]
pub struct CommandTransformer {
    program: String,
    args: Vec<String>,
}

impl CommandTransformer {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn render_args(&self, input: &Path, output: &Path, institution: &Institution) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
                    .replace(INSTITUTION_PLACEHOLDER, institution.id())
            })
            .collect()
    }
}

impl TransformStrategy for CommandTransformer {
    fn transform(
        &self,
        input: &Path,
        output: &Path,
        institution: &Institution,
    ) -> Result<TransformOutput, TransformError> {
        let args = self.render_args(input, output, institution);
        debug!(program = %self.program, ?args, "Running transformer");

        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| TransformError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        let diagnostics: Vec<String> = String::from_utf8_lossy(&result.stderr)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if !result.status.success() {
            return Err(TransformError::Exit {
                program: self.program.clone(),
                status: result.status.to_string(),
                diagnostics,
            });
        }

        if !output.exists() {
            return Err(TransformError::MissingOutput(output.to_path_buf()));
        }

        Ok(TransformOutput::new(diagnostics))
    }

    fn name(&self) -> &str {
        &self.program
    }
}
