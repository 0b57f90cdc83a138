//! Paginated list traversal
//!
//! Walks a chain of list pages starting at one root: fetch the page, extract
//! its item, asset and pager links, report the discoveries, then follow the
//! "next" link until there is none. Discoveries are handed off through a
//! channel as soon as each page is parsed, so nothing is buffered per crawl.
//!
//! Two behaviors beyond a plain walk:
//! - The first page of a chain is often reachable under an alias (such as
//!   `index.html`). When the second page is visited, its "previous" link
//!   names the canonical first page, which is fetched once more so both
//!   paths end up on disk.
//! - Every traversal remembers the pages it visited and stops when a "next"
//!   link points back into that set, so a self-referencing or cyclic pager
//!   cannot loop forever.

use crate::cache::LinkSink;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{parse_list_page, CompiledSelectors};
use crate::crawler::pool::WorkerPool;
use crate::output::{CrawlEvent, Progress};
use crate::state::TraversalState;
use crate::url::resolve_link;
use crate::{Link, MirrorError};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Links discovered on one list page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// The list page the links were found on
    pub page: Link,

    /// Detail pages
    pub items: Vec<Link>,

    /// Thumbnails
    pub assets: Vec<Link>,
}

/// Outcome of one completed traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalReport {
    /// The page the traversal started from
    pub root: Link,

    /// Pages in the pagination chain
    pub pages: usize,

    /// Total page fetches, including the canonical first-page refetch
    pub fetches: usize,

    /// True if the walk stopped on a "next" link it had already visited
    pub cycle_detected: bool,
}

/// Tracks the traversal state machine and rejects illegal moves
struct Walk {
    root: Link,
    state: TraversalState,
}

impl Walk {
    fn new(root: &Link) -> Self {
        Self {
            root: root.clone(),
            state: TraversalState::Fetching,
        }
    }

    fn advance(&mut self, next: TraversalState) -> Result<(), MirrorError> {
        if !self.state.can_transition_to(next) {
            return Err(MirrorError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(root = %self.root, "{} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, err: MirrorError) -> MirrorError {
        if self.state.can_transition_to(TraversalState::Failed) {
            self.state = TraversalState::Failed;
        }
        tracing::debug!(root = %self.root, "traversal failed: {}", err);
        err
    }
}

/// Paginates list pages and reports what they link to
pub struct ListTraversal {
    fetcher: Arc<Fetcher>,
    selectors: Arc<CompiledSelectors>,
    progress: Arc<Progress>,
}

impl ListTraversal {
    /// Creates a traversal sharing the run's fetcher, selectors and progress sink
    pub fn new(
        fetcher: Arc<Fetcher>,
        selectors: Arc<CompiledSelectors>,
        progress: Arc<Progress>,
    ) -> Self {
        Self {
            fetcher,
            selectors,
            progress,
        }
    }

    /// Walks the pagination chain starting at `root`
    ///
    /// Every visited page is persisted. One [`Discovery`] per page is sent to
    /// `sink` before the next page is fetched.
    ///
    /// # Errors
    ///
    /// * Transport or persistence failure of any page aborts the traversal
    /// * An unresolvable pager link is an extraction error
    /// * `MirrorError::Cancelled` if `cancel` fires or `sink` is closed
    pub async fn run(
        &self,
        root: Link,
        sink: &mpsc::Sender<Discovery>,
        cancel: &CancellationToken,
    ) -> Result<TraversalReport, MirrorError> {
        let mut walk = Walk::new(&root);
        let mut visited: HashSet<Link> = HashSet::new();
        let mut page = root.clone();
        let mut report = TraversalReport {
            root: root.clone(),
            pages: 0,
            fetches: 0,
            cycle_detected: false,
        };

        visited.insert(page.clone());

        for index in 0usize.. {
            if cancel.is_cancelled() {
                return Err(walk.fail(MirrorError::Cancelled));
            }

            // Fetching
            let body = match self.fetcher.save(&page).await {
                Ok(body) => body,
                Err(e) => return Err(walk.fail(e)),
            };
            report.pages += 1;
            report.fetches += 1;

            // Extracting
            walk.advance(TraversalState::Extracting)?;
            let result = match parse_list_page(&body, &page, &self.selectors) {
                Ok(result) => result,
                Err(e) => return Err(walk.fail(e)),
            };

            // Reporting
            walk.advance(TraversalState::Reporting)?;
            self.progress.record(CrawlEvent::PageParsed {
                link: page.clone(),
                items: result.items.len(),
                assets: result.assets.len(),
            });
            let discovery = Discovery {
                page: page.clone(),
                items: result.items,
                assets: result.assets,
            };
            if sink.send(discovery).await.is_err() {
                return Err(walk.fail(MirrorError::Cancelled));
            }

            if index == 1 {
                if let Some(previous) = result.previous.as_deref() {
                    let canonical = match resolve_pager(&page, previous) {
                        Ok(link) => link,
                        Err(e) => return Err(walk.fail(e)),
                    };
                    tracing::debug!(root = %root, "refetching first page as {}", canonical);
                    if let Err(e) = self.fetcher.save(&canonical).await {
                        return Err(walk.fail(e));
                    }
                    visited.insert(canonical);
                    report.fetches += 1;
                }
            }

            // Paginating
            walk.advance(TraversalState::Paginating)?;
            let Some(next_href) = result.next else {
                break;
            };
            let next = match resolve_pager(&page, &next_href) {
                Ok(link) => link,
                Err(e) => return Err(walk.fail(e)),
            };

            if !visited.insert(next.clone()) {
                tracing::warn!(
                    root = %root,
                    "pagination from {} points back to visited page {}, stopping",
                    page,
                    next
                );
                report.cycle_detected = true;
                break;
            }

            walk.advance(TraversalState::Fetching)?;
            page = next;
        }

        walk.advance(TraversalState::Done)?;
        tracing::trace!(root = %root, fetches = report.fetches, "traversal done");
        self.progress.record(CrawlEvent::TraversalDone {
            root,
            pages: report.pages,
        });
        Ok(report)
    }

    /// Runs independent traversals over `roots` on a bounded worker pool
    ///
    /// The first traversal to fail cancels every traversal still queued or
    /// between pages. Returns the number of roots completed.
    pub async fn run_multiple(
        self: &Arc<Self>,
        roots: Vec<Link>,
        pool: &WorkerPool,
        sink: mpsc::Sender<Discovery>,
        cancel: &CancellationToken,
    ) -> Result<usize, MirrorError> {
        let traversal = Arc::clone(self);
        pool.run(roots, cancel, move |root, token| {
            let traversal = Arc::clone(&traversal);
            let sink = sink.clone();
            async move { traversal.run(root, &sink, &token).await.map(|_| ()) }
        })
        .await
    }
}

fn resolve_pager(page: &Link, href: &str) -> Result<Link, MirrorError> {
    resolve_link(page.as_str(), href).map_err(|e| MirrorError::Extraction {
        link: page.clone(),
        message: format!("bad pager link '{}': {}", href, e),
    })
}

/// Drains discoveries into the detail-page and asset sinks
///
/// Returns the number of discoveries consumed once every sender is gone.
pub async fn collect_discoveries(
    mut rx: mpsc::Receiver<Discovery>,
    pages: Arc<dyn LinkSink>,
    assets: Arc<dyn LinkSink>,
) -> usize {
    let mut received = 0;
    while let Some(discovery) = rx.recv().await {
        pages.add_all(discovery.items);
        assets.add_all(discovery.assets);
        received += 1;
    }
    received
}
