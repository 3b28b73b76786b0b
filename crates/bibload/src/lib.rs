pub mod archive;
pub mod config;
pub mod error;
pub mod index;
pub mod institution;
pub mod job;
pub mod pipeline;
pub mod sanitize;
pub mod service;
pub mod telemetry;
pub mod transform;
pub mod working_area;

pub use archive::{ArchiveStore, FileArchiveStore, VersionOrigin, VersionSelector};
pub use config::{load_config, load_config_from_str, Config};
pub use error::{
    ArchiveError, BibloadError, ConfigError, IndexError, JobError, NotFoundError, Result,
    TransformError, UncompressError, WorkingAreaError,
};
pub use index::{CoreRegistry, IndexClient, IndexCore, SolrClient};
pub use institution::{Institution, InstitutionRegistry};
pub use job::{JobHandle, JobOutcome, JobProgressBroadcaster, JobStatus};
pub use service::IngestService;
pub use transform::{CommandTransformer, CopyTransformer, TransformStrategy, Uncompressor};
pub use working_area::{ProcessStep, WorkingArea};
