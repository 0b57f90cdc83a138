//! Deduplication cache shared by the crawl stages
//!
//! The cache is the only structure mutated by several worker pools at once.
//! All access goes through one reader/writer lock around a `HashSet`.

mod traits;

pub use traits::{LinkSet, LinkSink};

use crate::Link;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Concurrency-safe set of links already enqueued or downloaded
///
/// Entries are never removed; the cache lives for one mirror run.
#[derive(Debug, Default)]
pub struct LinkCache {
    links: RwLock<HashSet<Link>>,
}

impl LinkCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of distinct links recorded
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave a HashSet half-inserted,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashSet<Link>> {
        self.links.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<Link>> {
        self.links.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LinkSink for LinkCache {
    fn add(&self, link: Link) {
        self.write().insert(link);
    }

    fn add_all(&self, links: Vec<Link>) {
        let mut set = self.write();
        set.extend(links);
    }

    fn all(&self) -> Vec<Link> {
        self.read().iter().cloned().collect()
    }
}

impl LinkSet for LinkCache {
    fn contains(&self, link: &Link) -> bool {
        self.read().contains(link)
    }

    fn insert(&self, link: Link) -> bool {
        self.write().insert(link)
    }
}
