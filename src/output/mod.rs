//! Output module for progress reporting and run summaries
//!
//! - `progress`: structured crawl events, logged, counted and drawn as bars
//! - `stats`: the summary printed when a run finishes

mod progress;
mod stats;

pub use progress::{CrawlEvent, Phase, Progress, ProgressCounts};
pub use stats::{print_summary, CrawlSummary};
