//! Filesystem archive.
//!
//! Layout per (core, institution):
//!
//! ```text
//! <root>/<core>/<institution>/v<N>/base.<fmt>.zip
//!                                 /base.json
//!                                 /u<M>.<fmt>.zip
//!                                 /u<M>.json
//! ```
//!
//! A version directory is assembled under a hidden staging name and renamed
//! into place, and update artifacts are renamed from hidden temp names, so a
//! reader never sees a half-written entry and a crash never leaves a gap.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::archive::lock::KeyedLocks;
use crate::archive::model::{
    ArchiveReceipt, ArchiveRequest, ArchiveUpdate, ArchiveVersion, EntryMetadata, VersionSelector,
};
use crate::error::{ArchiveError, NotFoundError};
use crate::sanitize;
use crate::transform::Uncompressor;

const BASE_STEM: &str = "base";
const STAGING_PREFIX: &str = ".staging-";

static RE_VERSION_DIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^v([0-9]+)$").unwrap());
static RE_BASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^base\.(.+)\.zip$").unwrap());
static RE_UPDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^u([0-9]+)\.(.+)\.zip$").unwrap());

/// Durable record of every version and update per (core, institution).
pub trait ArchiveStore: Send + Sync {
    fn archive(&self, request: &ArchiveRequest<'_>) -> Result<ArchiveReceipt, ArchiveError>;

    fn get_version(
        &self,
        core: &str,
        institution_id: &str,
        selector: VersionSelector,
    ) -> Result<ArchiveVersion, ArchiveError>;

    /// Existing version numbers, ascending.
    fn list_versions(&self, core: &str, institution_id: &str) -> Result<Vec<u32>, ArchiveError>;
}

pub struct FileArchiveStore {
    root: PathBuf,
    uncompressor: Uncompressor,
    locks: KeyedLocks,
}

impl FileArchiveStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            uncompressor: Uncompressor::new(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn institution_dir(&self, core: &str, institution_id: &str) -> Result<PathBuf, ArchiveError> {
        for component in [core, institution_id] {
            if !sanitize::is_safe_component(component) {
                return Err(ArchiveError::InvalidKey(component.to_string()));
            }
        }
        Ok(self.root.join(core).join(institution_id))
    }

    /// Lists `(name, path)` of the direct children of `dir`. Missing dirs
    /// are empty.
    fn children(&self, dir: &Path) -> Result<Vec<(String, PathBuf, bool)>, ArchiveError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut children = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| ArchiveError::ReadEntry {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            if let Some(name) = entry.file_name().to_str() {
                children.push((
                    name.to_string(),
                    entry.path().to_path_buf(),
                    entry.file_type().is_dir(),
                ));
            }
        }
        Ok(children)
    }

    fn scan_versions(&self, institution_dir: &Path) -> Result<Vec<u32>, ArchiveError> {
        let mut versions: Vec<u32> = self
            .children(institution_dir)?
            .into_iter()
            .filter(|(_, _, is_dir)| *is_dir)
            .filter_map(|(name, _, _)| {
                RE_VERSION_DIR
                    .captures(&name)
                    .and_then(|c| c[1].parse().ok())
            })
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Update artifacts of a version, ascending by number (numerically, so
    /// `u10` follows `u9`).
    fn scan_updates(&self, version_dir: &Path) -> Result<Vec<(u32, PathBuf)>, ArchiveError> {
        let mut updates: Vec<(u32, PathBuf)> = self
            .children(version_dir)?
            .into_iter()
            .filter(|(_, _, is_dir)| !*is_dir)
            .filter_map(|(name, path, _)| {
                RE_UPDATE
                    .captures(&name)
                    .and_then(|c| c[1].parse().ok())
                    .map(|n| (n, path))
            })
            .collect();
        updates.sort_by_key(|(n, _)| *n);
        Ok(updates)
    }

    fn find_base(&self, version_dir: &Path) -> Result<Option<PathBuf>, ArchiveError> {
        Ok(self
            .children(version_dir)?
            .into_iter()
            .find(|(name, _, is_dir)| !*is_dir && RE_BASE.is_match(name))
            .map(|(_, path, _)| path))
    }

    fn read_metadata(&self, path: &Path) -> Result<Option<EntryMetadata>, ArchiveError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ArchiveError::ReadEntry {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ArchiveError::Metadata {
                path: path.to_path_buf(),
                source: e,
            })
    }

    fn write_metadata(&self, path: &Path, request: &ArchiveRequest<'_>) -> Result<(), ArchiveError> {
        let metadata = EntryMetadata {
            origin: request.origin,
            user: request.user.to_string(),
            created_at: Utc::now(),
            original_file_name: request.original_file_name.map(str::to_string),
        };
        let json = serde_json::to_string_pretty(&metadata).map_err(|e| ArchiveError::Metadata {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ArchiveError::WriteEntry {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn write_version(
        &self,
        institution_dir: &Path,
        version_number: u32,
        request: &ArchiveRequest<'_>,
    ) -> Result<ArchiveReceipt, ArchiveError> {
        std::fs::create_dir_all(institution_dir).map_err(|e| ArchiveError::CreateDirectory {
            path: institution_dir.to_path_buf(),
            source: e,
        })?;

        let staging = institution_dir.join(format!("{}{}", STAGING_PREFIX, uuid::Uuid::new_v4()));
        std::fs::create_dir(&staging).map_err(|e| ArchiveError::CreateDirectory {
            path: staging.clone(),
            source: e,
        })?;

        let file_name = format!("{}.{}", BASE_STEM, stored_format(request.artifact));
        let published = institution_dir.join(format!("v{}", version_number));

        let result = (|| -> Result<(), ArchiveError> {
            self.uncompressor
                .compress_file(request.artifact, &staging.join(&file_name))?;
            self.write_metadata(&staging.join(format!("{}.json", BASE_STEM)), request)?;
            std::fs::rename(&staging, &published).map_err(|e| ArchiveError::WriteEntry {
                path: published.clone(),
                source: e,
            })
        })();

        if let Err(e) = result {
            if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                warn!("Failed to remove archive staging directory: {}", cleanup);
            }
            return Err(e);
        }

        Ok(ArchiveReceipt {
            version_number,
            update_number: None,
            artifact: published.join(file_name),
        })
    }

    fn write_update(
        &self,
        version_dir: &Path,
        version_number: u32,
        update_number: u32,
        request: &ArchiveRequest<'_>,
    ) -> Result<ArchiveReceipt, ArchiveError> {
        let file_name = format!("u{}.{}", update_number, stored_format(request.artifact));
        let target = version_dir.join(&file_name);
        let temp = version_dir.join(format!(".{}.tmp", file_name));
        let sidecar = version_dir.join(format!("u{}.json", update_number));

        let result = (|| -> Result<(), ArchiveError> {
            self.uncompressor.compress_file(request.artifact, &temp)?;
            self.write_metadata(&sidecar, request)?;
            std::fs::rename(&temp, &target).map_err(|e| ArchiveError::WriteEntry {
                path: target.clone(),
                source: e,
            })
        })();

        if let Err(e) = result {
            remove_leftover(&temp);
            remove_leftover(&sidecar);
            return Err(e);
        }

        Ok(ArchiveReceipt {
            version_number,
            update_number: Some(update_number),
            artifact: target,
        })
    }
}

/// Removes a partially written entry. Absent files are fine.
fn remove_leftover(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial archive entry: {}", e),
    }
}

/// `records.xml` is stored as `xml.zip`; files without extension as `dat.zip`.
fn stored_format(artifact: &Path) -> String {
    let ext = artifact
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| sanitize::is_safe_component(e))
        .unwrap_or("dat");
    format!("{}.zip", ext)
}

impl ArchiveStore for FileArchiveStore {
    fn archive(&self, request: &ArchiveRequest<'_>) -> Result<ArchiveReceipt, ArchiveError> {
        let institution_dir = self.institution_dir(request.core, request.institution_id)?;

        let receipt = self
            .locks
            .with_lock(request.core, request.institution_id, || -> Result<_, ArchiveError> {
                let versions = self.scan_versions(&institution_dir)?;

                if !request.incremental {
                    let next = versions.last().map_or(1, |n| n + 1);
                    return self.write_version(&institution_dir, next, request);
                }

                let current = versions
                    .last()
                    .copied()
                    .ok_or_else(|| ArchiveError::NoBaseVersion {
                        core: request.core.to_string(),
                        institution: request.institution_id.to_string(),
                    })?;
                let version_dir = institution_dir.join(format!("v{}", current));
                let next = self
                    .scan_updates(&version_dir)?
                    .last()
                    .map_or(1, |(n, _)| n + 1);
                self.write_update(&version_dir, current, next, request)
            })?;

        info!(
            core = request.core,
            institution = request.institution_id,
            origin = %request.origin,
            user = request.user,
            "Archived version {}",
            receipt
        );
        Ok(receipt)
    }

    fn get_version(
        &self,
        core: &str,
        institution_id: &str,
        selector: VersionSelector,
    ) -> Result<ArchiveVersion, ArchiveError> {
        let institution_dir = self.institution_dir(core, institution_id)?;
        let not_found = || NotFoundError::Version {
            core: core.to_string(),
            institution: institution_id.to_string(),
            selector: selector.to_string(),
        };

        let versions = self.scan_versions(&institution_dir)?;
        let version_number = match selector {
            VersionSelector::Latest => versions.last().copied(),
            VersionSelector::Number(n) => versions.contains(&n).then_some(n),
        }
        .ok_or_else(not_found)?;

        let version_dir = institution_dir.join(format!("v{}", version_number));
        let artifact = self.find_base(&version_dir)?.ok_or_else(not_found)?;
        let metadata = self.read_metadata(&version_dir.join(format!("{}.json", BASE_STEM)))?;

        let updates = self
            .scan_updates(&version_dir)?
            .into_iter()
            .map(|(update_number, artifact)| -> Result<ArchiveUpdate, ArchiveError> {
                let metadata =
                    self.read_metadata(&version_dir.join(format!("u{}.json", update_number)))?;
                Ok(ArchiveUpdate {
                    update_number,
                    artifact,
                    metadata,
                })
            })
            .collect::<Result<Vec<_>, ArchiveError>>()?;

        debug!(
            core,
            institution = institution_id,
            "Resolved {} to version {} with {} updates",
            selector,
            version_number,
            updates.len()
        );

        Ok(ArchiveVersion {
            core: core.to_string(),
            institution_id: institution_id.to_string(),
            version_number,
            artifact,
            metadata,
            updates,
        })
    }

    fn list_versions(&self, core: &str, institution_id: &str) -> Result<Vec<u32>, ArchiveError> {
        let institution_dir = self.institution_dir(core, institution_id)?;
        self.scan_versions(&institution_dir)
    }
}
