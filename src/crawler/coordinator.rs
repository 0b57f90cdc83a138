//! Mirror coordinator - main run orchestration logic
//!
//! This module wires the pipeline together for one run:
//! - Creating the run directory and the storage backend
//! - Reading the front page for stylesheets and category roots
//! - Paginating the front page, then every category on a worker pool
//! - Handing the accumulated link sets to detail processing
//! - Assembling the run summary
//!
//! The pipeline is producer-then-consumer: all list traversal completes
//! before the first detail page is requested.

use crate::cache::{LinkCache, LinkSet, LinkSink};
use crate::config::{validate, Config};
use crate::crawler::detail::DetailProcessor;
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::listing::{collect_discoveries, ListTraversal};
use crate::crawler::parser::{parse_root_page, CompiledSelectors};
use crate::crawler::pool::WorkerPool;
use crate::output::{CrawlEvent, CrawlSummary, Phase, Progress};
use crate::storage::{create_run_dir, FsStorage};
use crate::{Link, MirrorError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of the channel between list traversals and the link collector
const DISCOVERY_BUFFER: usize = 64;

/// Main mirror coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<Fetcher>,
    selectors: Arc<CompiledSelectors>,
    progress: Arc<Progress>,
    detail_links: Arc<LinkCache>,
    asset_links: Arc<LinkCache>,
    output_dir: PathBuf,
    started_at: DateTime<Utc>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Validates the configuration, compiles selectors, builds the HTTP
    /// client and creates a fresh run directory below the data directory.
    ///
    /// # Arguments
    ///
    /// * `config` - The mirror configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(MirrorError)` - Invalid configuration or run directory failure
    pub fn new(config: Config) -> Result<Self, MirrorError> {
        validate(&config)?;

        let selectors = CompiledSelectors::compile(&config.selectors)?;
        let client = build_http_client(&config.crawler)?;

        let started_at = Utc::now();
        let output_dir = create_run_dir(
            Path::new(&config.output.data_dir),
            &config.output.run_prefix,
            started_at,
        )?;
        tracing::info!("Writing mirror to {}", output_dir.display());

        let storage = Arc::new(FsStorage::new(&output_dir));
        let fetcher = Fetcher::new(client, &config.site, storage)?;

        let progress = if config.output.progress_bars {
            Progress::new()
        } else {
            Progress::without_bars()
        };

        Ok(Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
            selectors: Arc::new(selectors),
            progress: Arc::new(progress),
            detail_links: Arc::new(LinkCache::new()),
            asset_links: Arc::new(LinkCache::new()),
            output_dir,
            started_at,
        })
    }

    /// Returns the directory this run writes into
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns the detail pages discovered so far
    pub fn detail_links(&self) -> &LinkCache {
        &self.detail_links
    }

    /// Returns the assets discovered or downloaded so far
    pub fn asset_links(&self) -> &LinkCache {
        &self.asset_links
    }

    /// Runs the complete pipeline
    ///
    /// 1. Fetches the front page and extracts stylesheets and categories
    /// 2. Downloads the stylesheets one by one
    /// 3. Paginates the front page
    /// 4. Paginates every category on the category pool
    /// 5. Downloads assets, then detail pages and their gallery images
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Every phase completed
    /// * `Err(MirrorError)` - The first failure; nothing after it was started
    pub async fn run(&self, cancel: &CancellationToken) -> Result<CrawlSummary, MirrorError> {
        let start_time = Instant::now();

        if cancel.is_cancelled() {
            return Err(MirrorError::Cancelled);
        }

        let root = Link::new(self.config.site.root_page.clone())?;
        tracing::info!("Reading front page {}", root);
        let body = self.fetcher.get(&root).await?;
        let front = parse_root_page(&body, &root, &self.selectors)?;
        tracing::info!(
            "Front page lists {} stylesheets and {} categories",
            front.stylesheets.len(),
            front.categories.len()
        );

        let statics = self.save_statics(front.stylesheets, cancel).await?;

        let traversal = Arc::new(ListTraversal::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.selectors),
            Arc::clone(&self.progress),
        ));

        let (tx, rx) = mpsc::channel(DISCOVERY_BUFFER);
        let collector = tokio::spawn(collect_discoveries(
            rx,
            Arc::clone(&self.detail_links) as Arc<dyn LinkSink>,
            Arc::clone(&self.asset_links) as Arc<dyn LinkSink>,
        ));

        self.progress.start_phase(Phase::RootListing, None);
        let report = traversal.run(root, &tx, cancel).await?;
        self.progress.record(CrawlEvent::PhaseComplete {
            phase: Phase::RootListing,
            items: report.pages,
        });

        let category_pool = WorkerPool::new("categories", self.config.crawler.category_workers);
        tracing::info!(
            "Paginating {} categories on {} workers",
            front.categories.len(),
            category_pool.workers()
        );
        self.progress
            .start_phase(Phase::Categories, Some(front.categories.len()));
        let categories = traversal
            .run_multiple(front.categories, &category_pool, tx.clone(), cancel)
            .await?;
        self.progress.record(CrawlEvent::PhaseComplete {
            phase: Phase::Categories,
            items: categories,
        });

        // Last sender gone: the collector drains what is left and returns
        drop(tx);
        let discoveries = collector.await?;
        tracing::debug!("Collected {} list page discoveries", discoveries);

        let pages = self.detail_links.all();
        let assets: Vec<Link> = self
            .asset_links
            .all()
            .into_iter()
            .filter(|asset| !statics.contains(asset))
            .collect();
        tracing::info!(
            "Discovered {} detail pages and {} assets",
            pages.len(),
            assets.len()
        );

        let processor = DetailProcessor::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.selectors),
            Arc::clone(&self.asset_links) as Arc<dyn LinkSet>,
            WorkerPool::new("assets", self.config.crawler.asset_workers),
            WorkerPool::new("details", self.config.crawler.detail_workers),
            Arc::clone(&self.progress),
        );
        processor.run(pages, assets, cancel).await?;

        let summary = CrawlSummary {
            output_dir: self.output_dir.clone(),
            started_at: self.started_at,
            elapsed: start_time.elapsed(),
            detail_links: self.detail_links.len(),
            asset_links: self.asset_links.len(),
            counts: self.progress.counts(),
        };

        tracing::info!(
            "Mirror completed: {} list pages, {} detail pages in {:?}",
            summary.counts.pages_parsed,
            summary.counts.detail_pages,
            summary.elapsed
        );

        Ok(summary)
    }

    /// Downloads stylesheets sequentially and records them as known assets
    ///
    /// Returns the stylesheets so they can be left out of the asset phase.
    async fn save_statics(
        &self,
        stylesheets: Vec<Link>,
        cancel: &CancellationToken,
    ) -> Result<HashSet<Link>, MirrorError> {
        let mut saved = HashSet::new();
        self.progress
            .start_phase(Phase::Statics, Some(stylesheets.len()));

        for sheet in stylesheets {
            if cancel.is_cancelled() {
                return Err(MirrorError::Cancelled);
            }
            if !self.asset_links.insert(sheet.clone()) {
                continue;
            }

            let body = self.fetcher.save(&sheet).await?;
            self.progress.record(CrawlEvent::AssetSaved {
                link: sheet.clone(),
                bytes: body.len() as u64,
            });
            saved.insert(sheet);
        }

        self.progress.record(CrawlEvent::PhaseComplete {
            phase: Phase::Statics,
            items: saved.len(),
        });
        Ok(saved)
    }
}

/// Runs a complete mirror operation
///
/// This is the main entry point for a run. It builds a [`Coordinator`] and
/// drives it to completion.
///
/// # Arguments
///
/// * `config` - The mirror configuration
/// * `cancel` - Cancelling this token stops the run before its next unit of work
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - Run completed successfully
/// * `Err(MirrorError)` - Run failed
pub async fn run_mirror(
    config: Config,
    cancel: &CancellationToken,
) -> Result<CrawlSummary, MirrorError> {
    let coordinator = Coordinator::new(config)?;
    coordinator.run(cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.output.data_dir = dir.path().to_string_lossy().into_owned();
        config.output.run_prefix = "test_".to_string();

        let coordinator = Coordinator::new(config).unwrap();

        assert!(coordinator.output_dir().is_dir());
        assert!(coordinator.output_dir().starts_with(dir.path()));
        let name = coordinator.output_dir().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("test_"));
        assert!(coordinator.detail_links().is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.output.data_dir = dir.path().to_string_lossy().into_owned();
        config.crawler.detail_workers = 0;

        let err = Coordinator::new(config).err().unwrap();
        assert!(matches!(err, MirrorError::Config(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.output.data_dir = dir.path().to_string_lossy().into_owned();
        config.site.base_url = "http://127.0.0.1:9".to_string();

        let coordinator = Coordinator::new(config).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = coordinator.run(&cancel).await.unwrap_err();
        assert!(matches!(err, MirrorError::Cancelled));
    }
}
