use crate::crawler::DEFAULT_WORKERS;
use serde::{Deserialize, Serialize};

/// Main configuration structure for Shelf-Mirror
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    pub selectors: SelectorConfig,
}

/// The site being mirrored
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Scheme and host every link is resolved against
    pub base_url: String,

    /// Link of the catalog's front page
    pub root_page: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://books.toscrape.com".to_string(),
            root_page: "index.html".to_string(),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Workers paginating category roots concurrently
    pub category_workers: usize,

    /// Workers downloading top-level assets
    pub asset_workers: usize,

    /// Workers processing detail pages
    pub detail_workers: usize,

    /// Whole-request timeout for a single fetch (seconds)
    pub request_timeout_secs: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            category_workers: DEFAULT_WORKERS,
            asset_workers: DEFAULT_WORKERS,
            detail_workers: DEFAULT_WORKERS,
            request_timeout_secs: 30,
            user_agent: format!("shelf-mirror/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Parent directory for run directories
    pub data_dir: String,

    /// Name prefix of each run directory
    pub run_prefix: String,

    /// Draw a terminal progress bar for each phase
    pub progress_bars: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            run_prefix: "run_".to_string(),
            progress_bars: true,
        }
    }
}

/// CSS selectors used to pull links out of catalog pages
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SelectorConfig {
    /// Product anchors on a list page; a nested `img` gives the thumbnail
    pub product: String,

    /// Anchor of the "next page" pager entry
    pub next_page: String,

    /// Anchor of the "previous page" pager entry
    pub previous_page: String,

    /// Category anchors on the front page
    pub categories: String,

    /// Stylesheet links on the front page
    pub stylesheets: String,

    /// Images inside a detail page's gallery
    pub gallery: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            product: "article.product_pod div.image_container a".to_string(),
            next_page: "ul.pager li.next a".to_string(),
            previous_page: "ul.pager li.previous a".to_string(),
            categories: "div.side_categories li a".to_string(),
            stylesheets: "link[type='text/css']".to_string(),
            gallery: "div#product_gallery img".to_string(),
        }
    }
}
