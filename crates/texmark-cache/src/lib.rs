//! Cache abstraction layer for texmark.
//!
//! This crate decouples the renderer from the storage used to memoize
//! highlighted code, typeset math, and whole documents. The core API is a
//! single two-operation trait:
//!
//! - [`Cache`]: string key-value store with `get` and `set`
//!
//! # Implementations
//!
//! - [`MemoryCache`]: process-lifetime map, the renderer's default
//! - [`NullCache`]: no-op implementation (always misses)
//! - [`FileCache`]: file-based implementation with version validation
//!
//! Keys are built with [`CacheKey`], which namespaces them by the kind of span
//! they belong to.
//!
//! # Example
//!
//! ```
//! use texmark_cache::{Cache, CacheKey, MemoryCache};
//!
//! let cache = MemoryCache::new();
//! let key = CacheKey::Math { expression: "x^2", display: false }.to_string();
//! cache.set(&key, "<span>x²</span>");
//! assert_eq!(cache.get(&key).as_deref(), Some("<span>x²</span>"));
//! ```

mod file;
mod key;
mod memory;

pub use file::FileCache;
pub use key::CacheKey;
pub use memory::MemoryCache;

/// A string key-value store.
///
/// Implementations must tolerate being called from inside the markdown
/// compiler's synchronous callbacks: `get` and `set` never re-enter the
/// renderer and must not wait on other render calls.
///
/// There is no atomicity across keys. Concurrent renders sharing a cache only
/// perform independent single-key reads and writes.
pub trait Cache: Send + Sync {
    /// Retrieve a cached value.
    ///
    /// Returns `None` on cache miss.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value in the cache.
    ///
    /// Overwrites any existing entry for the same key. Storage failures are
    /// swallowed; a cache is never required for correct output.
    fn set(&self, key: &str, value: &str);
}

/// No-op [`Cache`] that never stores or retrieves data.
///
/// Every `get` returns `None`; every `set` is silently discarded.
pub struct NullCache;

impl Cache for NullCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) {}
}
