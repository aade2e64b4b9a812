//! Per-scope instance cache.

use std::collections::HashMap;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

use crate::error::DiResult;
use crate::key::CacheKey;
use crate::metadata::AnyArc;

/// Resolved instances of one scope plus the lock serializing their construction.
///
/// `sync` is held for the whole construction of a missing entry, so for a
/// given key the factory runs at most once per scope and concurrent callers
/// wait for the first one to finish. The lock is reentrant because
/// construction of one entry resolves others from the same scope on the same
/// thread. Re-entering the *same* key is caught as a cycle before it gets
/// here.
pub(crate) struct ScopeCache {
    resolved: Mutex<HashMap<CacheKey, AnyArc>>,
    sync: ReentrantMutex<()>,
}

impl ScopeCache {
    pub(crate) fn new() -> Self {
        Self {
            resolved: Mutex::new(HashMap::new()),
            sync: ReentrantMutex::new(()),
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: &CacheKey) -> Option<AnyArc> {
        self.resolved.lock().get(key).cloned()
    }

    pub(crate) fn insert(&self, key: CacheKey, value: AnyArc) {
        self.resolved.lock().insert(key, value);
    }

    /// Takes the construction lock.
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.sync.lock()
    }

    /// Returns the cached value for `key`, running `create` if there is none.
    ///
    /// `lock_held` tells the cache that the caller already owns this scope's
    /// construction lock further up the stack.
    pub(crate) fn get_or_create<F>(&self, key: &CacheKey, lock_held: bool, create: F) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        if let Some(hit) = self.get(key) {
            tracing::trace!(service = %key.service_type, slot = key.slot, "cache hit");
            return Ok(hit);
        }

        let _sync = (!lock_held).then(|| self.sync.lock());
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = create()?;
        self.insert(key.clone(), value.clone());
        Ok(value)
    }

    /// Drops every cached value.
    pub(crate) fn clear(&self) {
        self.resolved.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.resolved.lock().len()
    }
}
