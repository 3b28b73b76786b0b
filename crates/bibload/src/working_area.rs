//! Per-job scratch directories.
//!
//! Every job gets `<base>/<key>/` with one sub-directory per pipeline step.
//! [`WorkingArea::acquire`] hands out a [`WorkingAreaGuard`] that removes the
//! job directory, plus any files registered with it, exactly once: either
//! through [`WorkingAreaGuard::release`] or when the guard is dropped.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::WorkingAreaError;
use crate::sanitize;

/// Pipeline step owning a scratch sub-directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStep {
    Upload,
    WorkingFormat,
    SolrFormat,
}

impl ProcessStep {
    pub fn dir_name(&self) -> &'static str {
        match self {
            ProcessStep::Upload => "upload",
            ProcessStep::WorkingFormat => "working-format",
            ProcessStep::SolrFormat => "solr-format",
        }
    }
}

impl fmt::Display for ProcessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone)]
pub struct WorkingArea {
    base_path: PathBuf,
}

impl WorkingArea {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Root directory of a job's scratch space. Not created.
    pub fn job_path(&self, key: &str) -> Result<PathBuf, WorkingAreaError> {
        if !sanitize::is_safe_component(key) {
            return Err(WorkingAreaError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }

    /// Returns the directory for `step` of job `key`, creating it if absent.
    pub fn folder(&self, step: ProcessStep, key: &str) -> Result<PathBuf, WorkingAreaError> {
        let path = self.job_path(key)?.join(step.dir_name());
        std::fs::create_dir_all(&path).map_err(|e| WorkingAreaError::CreateDirectory {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    /// Recursively deletes the job's scratch space. Missing paths are fine.
    pub fn release(&self, key: &str) -> Result<(), WorkingAreaError> {
        let path = self.job_path(key)?;
        debug!(job_id = %key, "Deleting working area");
        remove_dir_if_exists(&path)
    }

    pub fn acquire(&self, key: &str) -> Result<WorkingAreaGuard<'_>, WorkingAreaError> {
        // Validate up front so the guard can't be built for an unusable key.
        self.job_path(key)?;
        Ok(WorkingAreaGuard {
            area: self,
            key: key.to_string(),
            extra_files: Vec::new(),
            released: false,
        })
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), WorkingAreaError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WorkingAreaError::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn remove_file_if_exists(path: &Path) -> Result<(), WorkingAreaError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WorkingAreaError::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Scoped ownership of a job's scratch space.
pub struct WorkingAreaGuard<'a> {
    area: &'a WorkingArea,
    key: String,
    extra_files: Vec<PathBuf>,
    released: bool,
}

impl<'a> WorkingAreaGuard<'a> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn folder(&self, step: ProcessStep) -> Result<PathBuf, WorkingAreaError> {
        self.area.folder(step, &self.key)
    }

    /// Registers a file outside the working area (e.g. the uploaded temp
    /// file) to be deleted together with it.
    pub fn remove_on_release<P: Into<PathBuf>>(&mut self, path: P) {
        self.extra_files.push(path.into());
    }

    /// Releases the working area and registered files. Every path is
    /// attempted; the first failure is returned.
    pub fn release(mut self) -> Result<(), WorkingAreaError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), WorkingAreaError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut first_error = self.area.release(&self.key).err();
        for file in self.extra_files.drain(..) {
            debug!(file = %sanitize::redact_path(&file), "Deleting job input");
            if let Err(e) = remove_file_if_exists(&file) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for WorkingAreaGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(job_id = %self.key, "Failed to clean up working area: {}", e);
        }
    }
}
