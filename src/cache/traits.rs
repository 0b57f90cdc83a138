//! Capability traits for link caches
//!
//! Consumers depend on the narrowest capability they need instead of the
//! concrete [`LinkCache`](super::LinkCache).

use crate::Link;

/// A write-mostly sink that accumulates links and can hand back a snapshot
///
/// List traversal feeds discoveries into sinks; detail processing reads the
/// snapshot once traversal is over.
pub trait LinkSink: Send + Sync {
    /// Records one link; recording a known link is a no-op
    fn add(&self, link: Link);

    /// Records a batch of links
    ///
    /// The batch is not atomic as a whole, but no insert is ever lost when
    /// several callers add at the same time.
    fn add_all(&self, links: Vec<Link>);

    /// Returns a copy of every recorded link, in no particular order
    fn all(&self) -> Vec<Link>;
}

/// A membership set used to avoid downloading the same link twice
pub trait LinkSet: Send + Sync {
    /// Returns true if the link has been recorded
    fn contains(&self, link: &Link) -> bool;

    /// Records the link and returns true if it was not present before
    ///
    /// The check and the insert happen under one lock, so exactly one
    /// concurrent caller wins for a given link.
    fn insert(&self, link: Link) -> bool;
}
