//! Key-Value Backends
//!
//! The durable substrate under the local adapter: a flat map of string keys
//! to serialized documents. Two implementations:
//!
//! - [`MemoryStore`]: HashMap-backed, for tests and ephemeral sessions.
//! - [`FileStore`]: one `{key}.json` file per key inside a namespace directory.
//!   Storage: `{data_dir}/{namespace}/{key}.json`

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::fs::{atomic_write_bytes, validate_name_component};

/// Lock file name inside a namespace directory (advisory, cross-process)
pub const NAMESPACE_LOCK_FILE: &str = ".lock";

/// Flat string key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored document, or None if the key was never written.
    fn get(&self, key: &str) -> CoreResult<Option<String>>;

    /// Replaces the stored document.
    fn set(&self, key: &str, value: &str) -> CoreResult<()>;

    /// Removes the key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> CoreResult<()>;
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory key-value store. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CoreError::Storage("lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CoreError::Storage("lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CoreError::Storage("lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// File Store
// =============================================================================

/// File-backed key-value store rooted at a namespace directory.
///
/// Reads and writes are blocking `std::fs` calls. The local adapter issues
/// them inline from its async methods while holding its write lock, which
/// suits small per-user datasets on a current-thread runtime; a server
/// embedding should move them onto `tokio::task::spawn_blocking`.
pub struct FileStore {
    namespace_dir: PathBuf,
}

impl FileStore {
    /// Creates a store for `namespace` under `data_dir`
    pub fn new(data_dir: &Path, namespace: &str) -> CoreResult<Self> {
        validate_name_component(namespace, "namespace")?;
        Ok(Self {
            namespace_dir: data_dir.join(namespace),
        })
    }

    /// Returns the namespace directory path
    pub fn namespace_dir(&self) -> &Path {
        &self.namespace_dir
    }

    /// Returns the file path backing a key
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.namespace_dir.join(format!("{key}.json"))
    }

    fn with_lock<T>(&self, exclusive: bool, op: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        fs::create_dir_all(&self.namespace_dir).map_err(|e| {
            CoreError::Storage(format!(
                "Failed to create namespace directory {}: {}",
                self.namespace_dir.display(),
                e
            ))
        })?;

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.namespace_dir.join(NAMESPACE_LOCK_FILE))?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)?;
        } else {
            fs2::FileExt::lock_shared(&lock_file)?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock namespace lock file: {}", e);
        }

        result
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        validate_name_component(key, "key")?;
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }

        self.with_lock(false, || {
            let content = fs::read_to_string(&path).map_err(|e| {
                CoreError::Storage(format!("Failed to read {}: {}", path.display(), e))
            })?;
            Ok(Some(content))
        })
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        validate_name_component(key, "key")?;
        let path = self.key_path(key);
        self.with_lock(true, || atomic_write_bytes(&path, value.as_bytes()))
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        validate_name_component(key, "key")?;
        let path = self.key_path(key);
        self.with_lock(true, || {
            if path.exists() {
                fs::remove_file(&path)?;
            }
            Ok(())
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
