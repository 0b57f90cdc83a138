//! Run summary
//!
//! This module assembles the figures reported at the end of a mirror run
//! and prints them.

use crate::output::progress::ProgressCounts;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Summary of a completed mirror run
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    /// Directory the run wrote into
    pub output_dir: PathBuf,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration of the run
    pub elapsed: Duration,

    /// Distinct detail pages discovered by list traversal
    pub detail_links: usize,

    /// Distinct assets known at the end of the run
    pub asset_links: usize,

    /// Event counters collected during the run
    pub counts: ProgressCounts,
}

impl CrawlSummary {
    /// Average pages (list + detail) processed per second
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.counts.pages_parsed + self.counts.detail_pages) as f64 / secs
        } else {
            0.0
        }
    }
}

/// Prints the summary to stdout in a formatted manner
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Mirror Summary ===\n");

    println!("Output: {}", summary.output_dir.display());
    println!("Started: {}", summary.started_at.to_rfc3339());
    println!("Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    println!("Discovered:");
    println!("  Detail pages: {}", summary.detail_links);
    println!("  Assets: {}", summary.asset_links);
    println!();

    println!("Processed:");
    println!("  List pages parsed: {}", summary.counts.pages_parsed);
    println!("  Detail pages parsed: {}", summary.counts.detail_pages);
    println!(
        "  Assets saved: {} ({} bytes)",
        summary.counts.assets_saved, summary.counts.bytes_saved
    );
    println!("  Cache hits: {}", summary.counts.cache_hits);
    println!();

    println!("Rate: {:.2} pages/sec", summary.pages_per_second());
}
