use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Identifies one archive: an institution's uploads on one index core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveKey {
    pub core: String,
    pub institution: String,
}

impl ArchiveKey {
    pub fn new(core: &str, institution: &str) -> Self {
        Self {
            core: core.to_string(),
            institution: institution.to_string(),
        }
    }
}

/// Lazily created mutex per (core, institution).
///
/// Locks are never removed; the number of keys is bounded by the configured
/// cores times institutions.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<ArchiveKey, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: ArchiveKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key).or_default())
    }

    /// Runs `f` while holding the lock for (core, institution).
    ///
    /// A panic inside `f` poisons nothing of interest (the mutex guards no
    /// data), so poisoned locks are simply taken over.
    pub fn with_lock<R>(&self, core: &str, institution: &str, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(ArchiveKey::new(core, institution));
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}
