//! State module for tracking list traversal progress
//!
//! This module provides the state machine each list traversal walks through
//! while it paginates one root page.
//!
//! # Components
//!
//! - `TraversalState`: Fetching, Extracting, Reporting, Paginating, Done, Failed

mod traversal_state;

// Re-export main types
pub use traversal_state::TraversalState;
