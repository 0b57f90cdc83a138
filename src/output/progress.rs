//! Progress reporting for a mirror run
//!
//! The crawler reports structured [`CrawlEvent`]s here. Events are logged
//! through `tracing`, tallied, and drive one terminal progress bar per
//! pipeline phase. Nothing in this module feeds back into control flow.

use crate::Link;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{spinner:.blue} [{elapsed_precise}] {prefix:>12} {wide_bar:.cyan/blue} {pos}/{len} {msg}";

const SPINNER_TEMPLATE: &str = "{spinner:.blue} [{elapsed_precise}] {prefix:>12} {pos} pages {wide_msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const BAR_CHARS: &str = "█▓▒░  ";

/// Pipeline stage a [`CrawlEvent::PhaseComplete`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Stylesheets referenced by the front page
    Statics,
    /// Pagination of the front page itself
    RootListing,
    /// Pagination of every category root
    Categories,
    /// Download of top-level assets
    Assets,
    /// Detail pages and their secondary assets
    Details,
}

impl Phase {
    /// True if `event` is one unit of work for this phase's progress bar
    fn advances_on(self, event: &CrawlEvent) -> bool {
        matches!(
            (self, event),
            (Self::Statics, CrawlEvent::AssetSaved { .. })
                | (Self::RootListing, CrawlEvent::PageParsed { .. })
                | (Self::Categories, CrawlEvent::TraversalDone { .. })
                | (Self::Assets, CrawlEvent::AssetSaved { .. })
                | (Self::Details, CrawlEvent::DetailParsed { .. })
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Statics => "statics",
            Self::RootListing => "root listing",
            Self::Categories => "categories",
            Self::Assets => "assets",
            Self::Details => "details",
        };
        f.write_str(name)
    }
}

/// Something worth reporting happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    /// A list page was fetched and its links extracted
    PageParsed {
        link: Link,
        items: usize,
        assets: usize,
    },
    /// A pagination chain ran to its last page
    TraversalDone { root: Link, pages: usize },
    /// An asset was downloaded and stored
    AssetSaved { link: Link, bytes: u64 },
    /// A detail page was fetched and its gallery extracted
    DetailParsed { link: Link, images: usize },
    /// A secondary asset was skipped because it was already known
    CacheHit { link: Link },
    /// A pipeline stage finished
    PhaseComplete { phase: Phase, items: usize },
}

impl CrawlEvent {
    fn link(&self) -> Option<&Link> {
        match self {
            Self::PageParsed { link, .. }
            | Self::AssetSaved { link, .. }
            | Self::DetailParsed { link, .. }
            | Self::CacheHit { link } => Some(link),
            Self::TraversalDone { root, .. } => Some(root),
            Self::PhaseComplete { .. } => None,
        }
    }
}

/// Counter snapshot taken from a [`Progress`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressCounts {
    pub pages_parsed: u64,
    pub assets_saved: u64,
    pub bytes_saved: u64,
    pub detail_pages: u64,
    pub cache_hits: u64,
}

/// The bar of the phase currently running
struct PhaseBar {
    phase: Phase,
    bar: ProgressBar,
}

/// Event sink shared by every stage of a run
pub struct Progress {
    silent: bool,
    bars: bool,
    active: Mutex<Option<PhaseBar>>,
    pages_parsed: AtomicU64,
    assets_saved: AtomicU64,
    bytes_saved: AtomicU64,
    detail_pages: AtomicU64,
    cache_hits: AtomicU64,
}

impl Progress {
    fn build(silent: bool, bars: bool) -> Self {
        Self {
            silent,
            bars,
            active: Mutex::new(None),
            pages_parsed: AtomicU64::new(0),
            assets_saved: AtomicU64::new(0),
            bytes_saved: AtomicU64::new(0),
            detail_pages: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Creates a reporter that logs every event and draws a bar per phase
    pub fn new() -> Self {
        Self::build(false, true)
    }

    /// Creates a reporter that logs every event without drawing bars
    pub fn without_bars() -> Self {
        Self::build(false, false)
    }

    /// Creates a reporter that only counts
    pub fn silent() -> Self {
        Self::build(true, false)
    }

    /// Starts the bar for `phase`, replacing any bar still shown
    ///
    /// A known `total` draws a bounded bar; `None` draws a spinner that
    /// counts pages.
    pub fn start_phase(&self, phase: Phase, total: Option<usize>) {
        if !self.bars {
            return;
        }

        let bar = match total {
            Some(len) => styled(ProgressBar::new(len as u64), BAR_TEMPLATE),
            None => styled(ProgressBar::new_spinner(), SPINNER_TEMPLATE),
        };
        bar.set_prefix(phase.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));

        let previous = self.lock_active().replace(PhaseBar { phase, bar });
        if let Some(previous) = previous {
            previous.bar.finish_and_clear();
        }
    }

    /// Records one event
    pub fn record(&self, event: CrawlEvent) {
        match &event {
            CrawlEvent::PageParsed { .. } => {
                self.pages_parsed.fetch_add(1, Ordering::Relaxed);
            }
            CrawlEvent::AssetSaved { bytes, .. } => {
                self.assets_saved.fetch_add(1, Ordering::Relaxed);
                self.bytes_saved.fetch_add(*bytes, Ordering::Relaxed);
            }
            CrawlEvent::DetailParsed { .. } => {
                self.detail_pages.fetch_add(1, Ordering::Relaxed);
            }
            CrawlEvent::CacheHit { .. } => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
            }
            CrawlEvent::TraversalDone { .. } | CrawlEvent::PhaseComplete { .. } => {}
        }

        if self.bars {
            self.advance(&event);
        }

        if !self.silent {
            log_event(&event);
        }
    }

    /// Returns the current counters
    pub fn counts(&self) -> ProgressCounts {
        ProgressCounts {
            pages_parsed: self.pages_parsed.load(Ordering::Relaxed),
            assets_saved: self.assets_saved.load(Ordering::Relaxed),
            bytes_saved: self.bytes_saved.load(Ordering::Relaxed),
            detail_pages: self.detail_pages.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Returns the running phase and its bar position
    pub fn active_phase(&self) -> Option<(Phase, u64)> {
        self.lock_active()
            .as_ref()
            .map(|active| (active.phase, active.bar.position()))
    }

    fn advance(&self, event: &CrawlEvent) {
        let mut active = self.lock_active();
        let Some(current) = active.as_ref() else {
            return;
        };

        if current.phase.advances_on(event) {
            current.bar.inc(1);
            if let Some(link) = event.link() {
                current.bar.set_message(link.to_string());
            }
        } else if let CrawlEvent::PhaseComplete { phase, items } = event {
            if *phase == current.phase {
                current.bar.finish_with_message(format!("{} done", items));
                *active = None;
            }
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<PhaseBar>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        // A run that failed mid-phase leaves its bar where it stopped
        if let Some(active) = self.lock_active().take() {
            active.bar.abandon();
        }
    }
}

fn styled(bar: ProgressBar, template: &str) -> ProgressBar {
    let style = match ProgressStyle::with_template(template) {
        Ok(style) => style.tick_chars(TICK).progress_chars(BAR_CHARS),
        Err(_) => ProgressStyle::default_bar(),
    };
    bar.set_style(style);
    bar
}

fn log_event(event: &CrawlEvent) {
    match event {
        CrawlEvent::PageParsed {
            link,
            items,
            assets,
        } => tracing::debug!(%link, items, assets, "list page parsed"),
        CrawlEvent::TraversalDone { root, pages } => {
            tracing::debug!(%root, pages, "pagination finished")
        }
        CrawlEvent::AssetSaved { link, bytes } => {
            tracing::debug!(%link, bytes, "asset saved")
        }
        CrawlEvent::DetailParsed { link, images } => {
            tracing::debug!(%link, images, "detail page parsed")
        }
        CrawlEvent::CacheHit { link } => tracing::debug!(%link, "cache hit, skipping"),
        CrawlEvent::PhaseComplete { phase, items } => {
            tracing::info!(%phase, items, "phase complete")
        }
    }
}
