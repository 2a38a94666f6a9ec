//! Local filesystem object store.

use std::fs;
use std::path::{Component, Path, PathBuf};

use shift_core::{Error, Result};

use crate::ObjectStore;

/// Object store backed by a directory on the local filesystem.
///
/// Keys map to paths under `base_path`; intermediate directories are
/// created on write.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `base_path`, creating the directory if
    /// needed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Resolve a key to a path under the base directory.
    ///
    /// Rejects empty keys, absolute paths, and any `..` component so a key
    /// can never escape the store root.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(Error::Validation("object key must not be empty".into()));
        }

        let rel = Path::new(key);
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(Error::Validation(format!("invalid object key: {key}")));
                }
            }
        }

        Ok(self.base_path.join(rel))
    }
}

impl ObjectStore for LocalStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found("object", key))
            }
            Err(e) => Err(Error::storage(format!("read {key}: {e}"))),
        }
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::storage(format!("mkdir for {key}: {e}")))?;
        }
        fs::write(&path, data).map_err(|e| Error::storage(format!("write {key}: {e}")))?;
        tracing::debug!(key, size = data.len(), "Stored object");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(key, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found("object", key))
            }
            Err(e) => Err(Error::storage(format!("delete {key}: {e}"))),
        }
    }
}
