use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BibloadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transformation error: {0}")]
    Transform(#[from] TransformError),

    #[error("Uncompress error: {0}")]
    Uncompress(#[from] UncompressError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("Working area error: {0}")]
    WorkingArea(#[from] WorkingAreaError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid institution '{id}': {reason}")]
    InvalidInstitution { id: String, reason: String },

    #[error("Invalid index core '{name}': {reason}")]
    InvalidCore { name: String, reason: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to read transformation input '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write transformation output '{path}': {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start transformer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transformer '{program}' exited with {status}")]
    Exit {
        program: String,
        status: String,
        diagnostics: Vec<String>,
    },

    #[error("Transformation produced no output at '{0}'")]
    MissingOutput(PathBuf),
}

impl TransformError {
    /// Diagnostic messages emitted by the transformer before it failed.
    pub fn diagnostics(&self) -> &[String] {
        match self {
            TransformError::Exit { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

#[derive(Error, Debug)]
pub enum UncompressError {
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt or unsupported archive '{path}': {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Archive '{0}' contains no file entries")]
    Empty(PathBuf),

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to compress '{path}': {source}")]
    Compress {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read index artifact '{path}': {source}")]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Index server unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Index core '{core}' rejected the request with status {status}: {body}")]
    Rejected {
        core: String,
        status: u16,
        body: String,
    },

    #[error("Content of {institution} was deleted but the replacement upload failed: {source}")]
    Replace {
        institution: String,
        #[source]
        source: Box<IndexError>,
    },
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("No archived version of {institution} on core {core} to append an update to")]
    NoBaseVersion { core: String, institution: String },

    #[error("Failed to create archive directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive entry '{path}': {source}")]
    WriteEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read archive '{path}': {source}")]
    ReadEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid archive metadata '{path}': {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to compress artifact: {0}")]
    Compress(#[from] UncompressError),

    #[error("Invalid archive key component '{0}'")]
    InvalidKey(String),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

#[derive(Error, Debug)]
pub enum NotFoundError {
    #[error("No archived version {selector} of {institution} on core {core}")]
    Version {
        core: String,
        institution: String,
        selector: String,
    },

    #[error("Unknown institution: {0}")]
    Institution(String),

    #[error("Unknown index core: {0}")]
    Core(String),

    #[error("Unknown job: {0}")]
    Job(String),
}

#[derive(Error, Debug)]
pub enum WorkingAreaError {
    #[error("Invalid working area key '{0}'")]
    InvalidKey(String),

    #[error("Failed to create working directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Job executor is shut down")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, BibloadError>;
