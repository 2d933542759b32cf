//! In-memory cache implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::Cache;

/// Process-lifetime [`Cache`] backed by a `HashMap`.
///
/// No eviction, no TTL and no size bound: entries live until the cache is
/// dropped. Whole-document caching keys entries by the raw input, so callers
/// that enable it on unbounded input sets should supply their own cache.
///
/// The lock is held only for the duration of a single map operation.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        // A poisoned lock only means another writer panicked; the map itself
        // holds whole strings and is still consistent.
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(key.to_owned(), value.to_owned());
    }
}
