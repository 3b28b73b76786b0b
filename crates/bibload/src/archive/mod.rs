pub mod lock;
pub mod model;
pub mod store;

pub use lock::{ArchiveKey, KeyedLocks};
pub use model::{
    ArchiveReceipt, ArchiveRequest, ArchiveUpdate, ArchiveVersion, EntryMetadata, VersionOrigin,
    VersionSelector,
};
pub use store::{ArchiveStore, FileArchiveStore};
