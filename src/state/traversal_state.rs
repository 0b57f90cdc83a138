/// Traversal state definitions for the pagination walk
///
/// This module defines all states a list traversal can be in and which
/// transitions between them are legal.
use serde::Serialize;
use std::fmt;

/// Represents the current state of one list traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalState {
    // ===== Active States =====
    /// The current page is being downloaded
    Fetching,

    /// Item, asset and pagination links are being pulled out of the page
    Extracting,

    /// Discoveries are being handed to the consumer
    Reporting,

    /// Deciding whether a next page exists
    Paginating,

    // ===== Terminal States =====
    /// No next page remains
    Done,

    /// A fetch or extraction failed; the traversal is aborted
    Failed,
}

impl TraversalState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the traversal is still running
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving from `self` to `next` is legal
    ///
    /// Pagination loops back to `Fetching`; any active state may fail.
    pub fn can_transition_to(&self, next: TraversalState) -> bool {
        use TraversalState::*;

        match (self, next) {
            (Fetching, Extracting) => true,
            (Extracting, Reporting) => true,
            (Reporting, Paginating) => true,
            (Paginating, Fetching) | (Paginating, Done) => true,
            (from, Failed) => from.is_active(),
            _ => false,
        }
    }

    /// Returns the lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Reporting => "reporting",
            Self::Paginating => "paginating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible traversal states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Fetching,
            Self::Extracting,
            Self::Reporting,
            Self::Paginating,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for TraversalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
