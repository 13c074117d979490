//! Per-process export state: the image rewrite cache and the re-entrancy gate

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Record of image identifiers already redirected through the proxy.
///
/// Identifiers are the original `src`, or the element's markup when it has
/// no `src`. Entries are never evicted; `clear` is the only way to drop them.
#[derive(Debug, Default)]
pub struct ImageRewriteCache {
    seen: Mutex<HashSet<String>>,
}

impl ImageRewriteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id`; returns `false` if it was already present
    pub fn insert(&self, id: &str) -> bool {
        let mut seen = self.lock();
        if seen.contains(id) {
            return false;
        }
        seen.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Context shared by every export in one application process.
///
/// Holds the rewrite cache and the gate that keeps exports from overlapping.
/// Create one per process and pass it to each export call.
#[derive(Debug, Default)]
pub struct ExportSession {
    rewrite_cache: ImageRewriteCache,
    active: AtomicBool,
}

impl ExportSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rewrite_cache(&self) -> &ImageRewriteCache {
        &self.rewrite_cache
    }

    /// Whether an export currently holds the gate
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Acquire the gate, or `None` if another export holds it
    pub fn try_begin(&self) -> Option<ExportGuard<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ExportGuard {
                active: &self.active,
            })
    }
}

/// Holds the export gate; releases it when dropped
#[derive(Debug)]
pub struct ExportGuard<'a> {
    active: &'a AtomicBool,
}

impl Drop for ExportGuard<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_rejects_second_holder_until_released() {
        let session = ExportSession::new();
        let guard = session.try_begin().expect("first acquire");
        assert!(session.is_active());
        assert!(session.try_begin().is_none());
        drop(guard);
        assert!(!session.is_active());
        assert!(session.try_begin().is_some());
    }

    #[test]
    fn cache_insert_is_idempotent() {
        let cache = ImageRewriteCache::new();
        assert!(cache.insert("https://example.com/a.png"));
        assert!(!cache.insert("https://example.com/a.png"));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
