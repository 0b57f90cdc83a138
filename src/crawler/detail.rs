//! Asset and detail-page processing
//!
//! Runs after list traversal has finished, in two phases:
//! 1. Every top-level asset is downloaded on the asset pool.
//! 2. Every detail page is downloaded on the detail pool and its gallery
//!    images are extracted. Images not already known are downloaded; known
//!    ones are skipped.
//!
//! The phases are strictly ordered, so a failure in phase 1 means no detail
//! page is ever requested.

use crate::cache::LinkSet;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{parse_detail_page, CompiledSelectors};
use crate::crawler::pool::WorkerPool;
use crate::output::{CrawlEvent, Phase, Progress};
use crate::{Link, MirrorError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of both processing phases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetailReport {
    /// Top-level assets downloaded in phase 1
    pub assets: usize,

    /// Detail pages processed in phase 2
    pub pages: usize,
}

/// Downloads assets, then detail pages and their secondary assets
#[derive(Clone)]
pub struct DetailProcessor {
    fetcher: Arc<Fetcher>,
    selectors: Arc<CompiledSelectors>,
    known_assets: Arc<dyn LinkSet>,
    asset_pool: WorkerPool,
    detail_pool: WorkerPool,
    progress: Arc<Progress>,
}

impl DetailProcessor {
    /// Creates a processor
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Downloads and persists every link
    /// * `selectors` - Provides the gallery selector
    /// * `known_assets` - Assets already downloaded or claimed; secondary
    ///   assets are claimed here before they are downloaded
    /// * `asset_pool` - Pool for phase 1
    /// * `detail_pool` - Pool for phase 2
    /// * `progress` - Event sink
    pub fn new(
        fetcher: Arc<Fetcher>,
        selectors: Arc<CompiledSelectors>,
        known_assets: Arc<dyn LinkSet>,
        asset_pool: WorkerPool,
        detail_pool: WorkerPool,
        progress: Arc<Progress>,
    ) -> Self {
        Self {
            fetcher,
            selectors,
            known_assets,
            asset_pool,
            detail_pool,
            progress,
        }
    }

    /// Runs both phases
    ///
    /// # Arguments
    ///
    /// * `pages` - Distinct detail pages discovered by list traversal
    /// * `assets` - Distinct top-level assets discovered by list traversal
    /// * `cancel` - Run-wide cancellation token
    ///
    /// # Returns
    ///
    /// * `Ok(DetailReport)` - Both phases completed
    /// * `Err(MirrorError)` - The first failure, identifying its link
    pub async fn run(
        &self,
        pages: Vec<Link>,
        assets: Vec<Link>,
        cancel: &CancellationToken,
    ) -> Result<DetailReport, MirrorError> {
        tracing::info!(
            "Downloading {} assets on {} workers",
            assets.len(),
            self.asset_pool.workers()
        );
        self.progress.start_phase(Phase::Assets, Some(assets.len()));
        let this = self.clone();
        let saved_assets = self
            .asset_pool
            .run(assets, cancel, move |asset, _| {
                let this = this.clone();
                async move { this.save_asset(&asset).await }
            })
            .await?;
        self.progress.record(CrawlEvent::PhaseComplete {
            phase: Phase::Assets,
            items: saved_assets,
        });

        tracing::info!(
            "Processing {} detail pages on {} workers",
            pages.len(),
            self.detail_pool.workers()
        );
        self.progress.start_phase(Phase::Details, Some(pages.len()));
        let this = self.clone();
        let processed = self
            .detail_pool
            .run(pages, cancel, move |page, _| {
                let this = this.clone();
                async move { this.process_page(&page).await }
            })
            .await?;
        self.progress.record(CrawlEvent::PhaseComplete {
            phase: Phase::Details,
            items: processed,
        });

        Ok(DetailReport {
            assets: saved_assets,
            pages: processed,
        })
    }

    async fn save_asset(&self, asset: &Link) -> Result<(), MirrorError> {
        let body = self.fetcher.save(asset).await?;
        self.progress.record(CrawlEvent::AssetSaved {
            link: asset.clone(),
            bytes: body.len() as u64,
        });
        Ok(())
    }

    /// Downloads one detail page and every gallery image not yet known
    async fn process_page(&self, page: &Link) -> Result<(), MirrorError> {
        let body = self.fetcher.save(page).await?;
        let images = parse_detail_page(&body, page, &self.selectors)?;

        self.progress.record(CrawlEvent::DetailParsed {
            link: page.clone(),
            images: images.len(),
        });

        for image in images {
            // Claiming before downloading keeps two pages from fetching the same image
            if self.known_assets.insert(image.clone()) {
                self.save_asset(&image).await?;
            } else {
                self.progress.record(CrawlEvent::CacheHit { link: image });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{LinkCache, LinkSink};
    use crate::config::{CrawlerConfig, SelectorConfig, SiteConfig};
    use crate::crawler::fetcher::build_http_client;
    use crate::storage::FsStorage;
    use crate::ErrorKind;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn link(p: &str) -> Link {
        Link::new(p).unwrap()
    }

    fn detail_page(images: &[&str]) -> String {
        let mut html = String::from(r#"<html><body><div id="product_gallery"><div class="carousel-inner">"#);
        for src in images {
            html.push_str(&format!(r#"<div class="item"><img src="{}"></div>"#, src));
        }
        html.push_str("</div></div></body></html>");
        html
    }

    async fn mount(server: &MockServer, at: &str, body: impl Into<Vec<u8>>, times: u64) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.into()))
            .expect(times)
            .mount(server)
            .await;
    }

    struct Setup {
        processor: DetailProcessor,
        known: Arc<LinkCache>,
        progress: Arc<Progress>,
        dir: TempDir,
    }

    fn setup(server: &MockServer) -> Setup {
        let dir = tempfile::tempdir().unwrap();
        let client = build_http_client(&CrawlerConfig::default()).unwrap();
        let site = SiteConfig {
            base_url: server.uri(),
            ..SiteConfig::default()
        };
        let fetcher = Fetcher::new(client, &site, Arc::new(FsStorage::new(dir.path()))).unwrap();
        let selectors = CompiledSelectors::compile(&SelectorConfig::default()).unwrap();
        let known = Arc::new(LinkCache::new());
        let progress = Arc::new(Progress::silent());

        let processor = DetailProcessor::new(
            Arc::new(fetcher),
            Arc::new(selectors),
            known.clone(),
            WorkerPool::new("assets", 3),
            WorkerPool::new("details", 3),
            progress.clone(),
        );

        Setup {
            processor,
            known,
            progress,
            dir,
        }
    }

    #[tokio::test]
    async fn test_assets_then_details() {
        let server = MockServer::start().await;
        mount(&server, "/media/a.jpg", "aaaa", 1).await;
        mount(&server, "/media/b.jpg", "bb", 1).await;
        mount(&server, "/catalogue/a_1/index.html", detail_page(&["../../media/a-large.jpg"]), 1).await;
        mount(&server, "/media/a-large.jpg", "large", 1).await;

        let s = setup(&server);
        s.known.add_all(vec![link("media/a.jpg"), link("media/b.jpg")]);

        let report = s
            .processor
            .run(
                vec![link("catalogue/a_1/index.html")],
                vec![link("media/a.jpg"), link("media/b.jpg")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report, DetailReport { assets: 2, pages: 1 });
        assert!(s.known.contains(&link("media/a-large.jpg")));
        assert!(s.dir.path().join("catalogue/a_1/index.html").is_file());
        assert_eq!(
            std::fs::read(s.dir.path().join("media/a-large.jpg")).unwrap(),
            b"large"
        );

        let counts = s.progress.counts();
        assert_eq!(counts.assets_saved, 3);
        assert_eq!(counts.bytes_saved, 4 + 2 + 5);
        assert_eq!(counts.detail_pages, 1);
        assert_eq!(counts.cache_hits, 0);
    }

    #[tokio::test]
    async fn test_known_gallery_images_are_skipped() {
        let server = MockServer::start().await;
        mount(&server, "/media/a.jpg", "a", 1).await;
        mount(&server, "/catalogue/a_1/index.html", detail_page(&["../../media/a.jpg"]), 1).await;

        let s = setup(&server);
        s.known.add(link("media/a.jpg"));

        s.processor
            .run(
                vec![link("catalogue/a_1/index.html")],
                vec![link("media/a.jpg")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(s.progress.counts().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_shared_gallery_image_is_downloaded_once() {
        let server = MockServer::start().await;
        for item in ["a_1", "b_2", "c_3", "d_4"] {
            mount(
                &server,
                &format!("/catalogue/{}/index.html", item),
                detail_page(&["../../media/shared.jpg"]),
                1,
            )
            .await;
        }
        mount(&server, "/media/shared.jpg", "shared", 1).await;

        let s = setup(&server);
        let pages = vec![
            link("catalogue/a_1/index.html"),
            link("catalogue/b_2/index.html"),
            link("catalogue/c_3/index.html"),
            link("catalogue/d_4/index.html"),
        ];

        s.processor
            .run(pages, Vec::new(), &CancellationToken::new())
            .await
            .unwrap();

        let counts = s.progress.counts();
        assert_eq!(counts.assets_saved, 1);
        assert_eq!(counts.cache_hits, 3);
    }

    #[tokio::test]
    async fn test_asset_failure_skips_detail_phase() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mount(&server, "/catalogue/a_1/index.html", detail_page(&[]), 0).await;

        let s = setup(&server);

        let err = s
            .processor
            .run(
                vec![link("catalogue/a_1/index.html")],
                vec![link("media/missing.jpg")],
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.link().unwrap().as_str(), "media/missing.jpg");
    }

    #[tokio::test]
    async fn test_gallery_failure_names_image() {
        let server = MockServer::start().await;
        mount(&server, "/catalogue/a_1/index.html", detail_page(&["../../media/gone.jpg"]), 1).await;
        Mock::given(method("GET"))
            .and(path("/media/gone.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let s = setup(&server);

        let err = s
            .processor
            .run(
                vec![link("catalogue/a_1/index.html")],
                Vec::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.work_item().unwrap().as_str(), "catalogue/a_1/index.html");
        assert_eq!(err.link().unwrap().as_str(), "media/gone.jpg");
    }

    #[tokio::test]
    async fn test_cancelled_run_fetches_nothing() {
        let server = MockServer::start().await;
        mount(&server, "/media/a.jpg", "a", 0).await;

        let s = setup(&server);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = s
            .processor
            .run(Vec::new(), vec![link("media/a.jpg")], &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancellation);
    }
}
