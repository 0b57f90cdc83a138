//! Crawler module for catalog traversal and download
//!
//! This module contains the core mirroring logic, including:
//! - HTTP fetching and persistence of every visited link
//! - HTML parsing and link extraction
//! - Bounded worker pools with fail-fast cancellation
//! - Pagination of list pages
//! - Asset and detail-page processing
//! - Overall run coordination

mod coordinator;
mod detail;
mod fetcher;
mod listing;
mod parser;
mod pool;

pub use coordinator::{run_mirror, Coordinator};
pub use detail::{DetailProcessor, DetailReport};
pub use fetcher::{build_http_client, Fetcher};
pub use listing::{collect_discoveries, Discovery, ListTraversal, TraversalReport};
pub use parser::{
    extract_links, parse_detail_page, parse_list_page, parse_root_page, CompiledSelectors,
    ExtractedLink, PageResult, RootPage,
};
pub use pool::{WorkerPool, DEFAULT_WORKERS};
