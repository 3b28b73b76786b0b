use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::NotFoundError;
use crate::transform::TransformStrategy;

/// A member institution submitting metadata, together with the strategy
/// that converts its uploads into the working format.
#[derive(Clone)]
pub struct Institution {
    id: String,
    name: String,
    strategy: Arc<dyn TransformStrategy>,
}

impl Institution {
    pub fn new<I: Into<String>, N: Into<String>>(
        id: I,
        name: N,
        strategy: Arc<dyn TransformStrategy>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            strategy,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> &dyn TransformStrategy {
        self.strategy.as_ref()
    }
}

impl fmt::Debug for Institution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Institution")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl fmt::Display for Institution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Institutions known to this deployment, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InstitutionRegistry {
    institutions: BTreeMap<String, Arc<Institution>>,
}

impl InstitutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, institution: Institution) {
        self.institutions
            .insert(institution.id().to_string(), Arc::new(institution));
    }

    pub fn get(&self, id: &str) -> Result<Arc<Institution>, NotFoundError> {
        self.institutions
            .get(id)
            .cloned()
            .ok_or_else(|| NotFoundError::Institution(id.to_string()))
    }

    /// All institutions ordered by id.
    pub fn all(&self) -> impl Iterator<Item = &Arc<Institution>> {
        self.institutions.values()
    }

    pub fn len(&self) -> usize {
        self.institutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.institutions.is_empty()
    }
}
