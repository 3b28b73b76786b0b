use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an archived artifact entered the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrigin {
    /// Produced by the ingestion pipeline from an institution's upload.
    Upload,
    /// Handed to the archive directly by an operator.
    Import,
}

impl fmt::Display for VersionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionOrigin::Upload => write!(f, "upload"),
            VersionOrigin::Import => write!(f, "import"),
        }
    }
}

/// Sidecar metadata stored next to every archived artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub origin: VersionOrigin,
    pub user: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_file_name: Option<String>,
}

/// One incremental ingestion layered on top of a version.
#[derive(Debug, Clone)]
pub struct ArchiveUpdate {
    pub update_number: u32,
    /// Compressed index-format artifact.
    pub artifact: PathBuf,
    pub metadata: Option<EntryMetadata>,
}

/// A full ingestion for one (core, institution) and its update chain.
#[derive(Debug, Clone)]
pub struct ArchiveVersion {
    pub core: String,
    pub institution_id: String,
    pub version_number: u32,
    /// Compressed index-format artifact of the full ingestion.
    pub artifact: PathBuf,
    pub metadata: Option<EntryMetadata>,
    /// Ascending by update number.
    pub updates: Vec<ArchiveUpdate>,
}

impl ArchiveVersion {
    pub fn latest_update_number(&self) -> Option<u32> {
        self.updates.last().map(|u| u.update_number)
    }

    /// `version.update`, with update `0` meaning the bare version.
    pub fn label(&self) -> String {
        format!(
            "{}.{}",
            self.version_number,
            self.latest_update_number().unwrap_or(0)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Number(u32),
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest => write!(f, "latest"),
            VersionSelector::Number(n) => write!(f, "v{}", n),
        }
    }
}

/// Everything needed to archive one processed artifact.
#[derive(Debug, Clone)]
pub struct ArchiveRequest<'a> {
    pub artifact: &'a Path,
    pub core: &'a str,
    pub institution_id: &'a str,
    pub incremental: bool,
    pub origin: VersionOrigin,
    pub user: &'a str,
    pub original_file_name: Option<&'a str>,
}

/// Where an artifact ended up in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReceipt {
    pub version_number: u32,
    pub update_number: Option<u32>,
    pub artifact: PathBuf,
}

impl fmt::Display for ArchiveReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.update_number {
            Some(update) => write!(f, "{}.{}", self.version_number, update),
            None => write!(f, "{}", self.version_number),
        }
    }
}
