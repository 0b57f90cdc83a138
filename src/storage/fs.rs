//! Filesystem storage backend
//!
//! Writes each link to `<root>/<link>`, mirroring the site's path structure.

use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::Link;
use async_trait::async_trait;
use std::path::PathBuf;

/// Storage backend writing into a directory tree
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Creates a backend rooted at an existing directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the file path a link is stored under
    pub fn path_for(&self, link: &Link) -> PathBuf {
        self.root.join(link.as_str())
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn store(&self, link: &Link, bytes: &[u8]) -> StorageResult<u64> {
        let path = self.path_for(link);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: path.clone(),
                source,
            })?;

        tracing::trace!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(bytes.len() as u64)
    }
}
