//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::Link;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// A backend persists the bytes of one link under a key derived verbatim
/// from the link string. Implementations must be safe to share between
/// worker tasks.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persists `bytes` under `link`
    ///
    /// Any intermediate directories implied by the link are created.
    /// Storing the same link twice overwrites the earlier copy.
    ///
    /// # Returns
    ///
    /// The number of bytes stored
    async fn store(&self, link: &Link, bytes: &[u8]) -> StorageResult<u64>;
}
