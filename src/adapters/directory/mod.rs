//! Directory adapter: BlobStore backed by files under a root directory.
//!
//! Keys are relative paths. Keys that would resolve outside the root
//! (absolute paths, `..` components) are refused.

use std::path::{Component, Path, PathBuf};

use crate::adapters::StoreError;
use crate::ports::BlobStore;

/// Read-only blob store over a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    /// Open a store rooted at `root`.
    ///
    /// # Errors
    /// Returns `StoreError::Io` if `root` is not a readable directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        let meta = std::fs::metadata(&root).map_err(|source| StoreError::Io {
            key: root.display().to_string(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(StoreError::Io {
                key: root.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            });
        }
        Ok(Self { root })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key);
        let confined = !key.is_empty()
            && !key.contains('\\')
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !confined {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl BlobStore for DirectoryBlobStore {
    type Error = StoreError;

    fn fetch(&self, key: &str) -> Result<Vec<u8>, Self::Error> {
        let path = self.resolve(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => {
                tracing::debug!("Read blob {key} ({} bytes)", bytes.len());
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn contains(&self, key: &str) -> Result<bool, Self::Error> {
        Ok(self.resolve(key)?.is_file())
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }
}
