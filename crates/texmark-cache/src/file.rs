//! File-based cache implementation.
//!
//! [`FileCache`] stores each entry as a file on disk. Raw keys can be
//! arbitrarily long and contain any character (whole-document keys embed the
//! full input), so entries are named by the hex SHA-256 of the key and the key
//! itself is stored in a header for verification:
//!
//! ```text
//! [key_len: u32 LE][key bytes][value bytes]
//! ```
//!
//! On read, only the header is read first to compare the stored key. The value
//! is read only on a verified hit.
//!
//! On construction, [`FileCache`] validates a `VERSION` file in the cache root.
//! If the version mismatches or is missing, the entire cache directory is wiped
//! and recreated. This ensures entries produced by a different engine version
//! are never reused.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::Cache;
use crate::key::hash_key;

/// File-based [`Cache`] rooted at a directory on disk.
///
/// Directory layout:
/// ```text
/// {root}/
/// +-- VERSION            # contains the cache version string
/// +-- 3f/                # first two hex digits of the key hash
///     +-- 3f9a...e1      # cache entry
/// ```
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Create a new file-based cache at `root`, validating the cache version.
    ///
    /// If the `VERSION` file inside `root` does not match `version`, the entire
    /// cache directory is removed and recreated with the new version. Errors
    /// during validation are logged but never fatal.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        validate_version(&root, version);
        Self { root }
    }

    /// Root directory of this cache.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let hash = hash_key(key);
        self.root.join(&hash[..2]).join(&hash)
    }
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        let mut file = File::open(&path).ok()?;

        // Read key length (u32 LE)
        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf).ok()?;
        let key_len = u32::from_le_bytes(len_buf) as usize;

        // Guard against hash collisions and truncated files
        if key_len != key.len() {
            return None;
        }
        let mut stored_key = vec![0u8; key_len];
        file.read_exact(&mut stored_key).ok()?;
        if stored_key != key.as_bytes() {
            tracing::debug!("cache key hash collision at {}", path.display());
            return None;
        }

        let mut value = String::new();
        file.read_to_string(&mut value).ok()?;
        Some(value)
    }

    fn set(&self, key: &str, value: &str) {
        let path = self.entry_path(key);

        // Silently ignore errors; the cache is optional
        let Some(parent) = path.parent() else {
            return;
        };
        if fs::create_dir_all(parent).is_err() {
            return;
        }
        let Ok(key_len) = u32::try_from(key.len()) else {
            return;
        };

        let mut buf = Vec::with_capacity(4 + key.len() + value.len());
        buf.extend_from_slice(&key_len.to_le_bytes());
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(value.as_bytes());

        if let Err(e) = fs::write(&path, &buf) {
            tracing::warn!("failed to write cache entry {}: {e}", path.display());
        }
    }
}

/// Validate the cache version, wiping the directory on mismatch.
fn validate_version(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("cache version matches: {version}");
            return;
        }
        Ok(stored) => {
            tracing::info!(
                "cache version mismatch (stored={stored}, current={version}), wiping cache"
            );
        }
        Err(_) => {
            tracing::info!("no cache VERSION file found, initializing cache");
        }
    }

    // Wipe and recreate
    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove cache directory: {e}");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!("failed to create cache directory: {e}");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!("failed to write cache VERSION file: {e}");
    }
}
