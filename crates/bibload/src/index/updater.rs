use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{IndexError, NotFoundError};
use crate::index::client::IndexClient;
use crate::institution::Institution;
use crate::sanitize;

/// A named partition of the search index.
pub struct IndexCore {
    name: String,
    client: Arc<dyn IndexClient>,
}

impl IndexCore {
    pub fn new<S: Into<String>>(name: S, client: Arc<dyn IndexClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &dyn IndexClient {
        self.client.as_ref()
    }
}

impl fmt::Debug for IndexCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexCore").field("name", &self.name).finish()
    }
}

#[derive(Debug, Default)]
pub struct CoreRegistry {
    cores: BTreeMap<String, Arc<IndexCore>>,
}

impl CoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, core: IndexCore) {
        self.cores.insert(core.name().to_string(), Arc::new(core));
    }

    pub fn get(&self, name: &str) -> Result<Arc<IndexCore>, NotFoundError> {
        self.cores
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError::Core(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cores.keys().map(String::as_str)
    }
}

/// Sequences writes to the search index.
#[derive(Debug, Clone, Default)]
pub struct IndexUpdater;

impl IndexUpdater {
    pub fn new() -> Self {
        Self
    }

    /// Applies an ingested artifact. A full (non-incremental) artifact
    /// replaces everything the institution had in the core; if its upload
    /// fails after the delete went through, the error is
    /// `IndexError::Replace` and the institution is missing from the core.
    pub fn apply(
        &self,
        core: &IndexCore,
        institution: &Institution,
        artifact: &Path,
        incremental: bool,
    ) -> Result<String, IndexError> {
        if incremental {
            return self.upload(core, artifact);
        }

        self.delete_institution(core, institution)?;
        self.upload(core, artifact).map_err(|e| IndexError::Replace {
            institution: institution.id().to_string(),
            source: Box::new(e),
        })
    }

    /// Sends one artifact as an upsert batch.
    pub fn upload(&self, core: &IndexCore, artifact: &Path) -> Result<String, IndexError> {
        let file = sanitize::redact_path(artifact);
        info!(core = core.name(), file = %file, "Updating index");
        let start = Instant::now();

        let response = core.client().update(artifact)?;

        info!(
            core = core.name(),
            file = %file,
            "Index update took {} ms",
            start.elapsed().as_millis()
        );
        Ok(response)
    }

    pub fn delete_institution(
        &self,
        core: &IndexCore,
        institution: &Institution,
    ) -> Result<(), IndexError> {
        debug!(core = core.name(), institution = institution.id(), "Deleting institution from index");
        core.client().delete_institution(institution.id())
    }
}
