//! Storage module for persisting mirrored content
//!
//! This module handles writing fetched bytes to disk, including:
//! - The backend trait the crawler writes through
//! - A filesystem backend that mirrors the site's path structure
//! - Creation of a fresh directory per mirror run

mod fs;
mod traits;

pub use fs::FsStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Creates a fresh run directory below `data_dir`
///
/// The directory is named `<prefix><timestamp>`. It is created with
/// `create_dir`, so an existing directory is never reused; `data_dir` itself
/// is created if missing.
///
/// # Arguments
///
/// * `data_dir` - Parent directory for all runs
/// * `prefix` - Name prefix for the run directory
/// * `started_at` - Timestamp embedded in the directory name
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the new run directory
/// * `Err(std::io::Error)` - The directory could not be created
pub fn create_run_dir(
    data_dir: &Path,
    prefix: &str,
    started_at: DateTime<Utc>,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(data_dir)?;

    let stamp = started_at.format("%Y%m%d_%H%M%S_%3f");
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{}{}", prefix, stamp)
        } else {
            format!("{}{}_{}", prefix, stamp, attempt)
        };
        let path = data_dir.join(name);

        match std::fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 100 => {
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
