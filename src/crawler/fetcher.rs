//! HTTP fetcher implementation
//!
//! This module handles all network access for the crawler:
//! - Building the HTTP client with the configured user agent and timeout
//! - Turning a site-relative [`Link`] into an absolute URL
//! - GET requests, where any non-2xx status is an error
//! - Handing fetched bytes to the storage backend
//!
//! Nothing is retried: a failed fetch is a hard error for its link.

use crate::config::{CrawlerConfig, SiteConfig};
use crate::storage::Storage;
use crate::{Link, MirrorError, UrlError};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration (user agent and timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches links from one site and persists them through a storage backend
pub struct Fetcher {
    client: Client,
    base_url: Url,
    storage: Arc<dyn Storage>,
}

impl Fetcher {
    /// Creates a fetcher for the site described by `site`
    ///
    /// The base URL is treated as a directory: a missing trailing slash is
    /// added so links resolve below it rather than beside it.
    pub fn new(
        client: Client,
        site: &SiteConfig,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, MirrorError> {
        let mut base_url = Url::parse(&site.base_url).map_err(|e| UrlError::Join {
            link: site.base_url.clone(),
            message: e.to_string(),
        })?;

        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            storage,
        })
    }

    /// Returns the absolute URL a link is fetched from
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use shelf_mirror::crawler::Fetcher;
    /// # use shelf_mirror::Link;
    /// # fn example(fetcher: &Fetcher) {
    /// let url = fetcher.absolute_url(&Link::new("catalogue/page-2.html").unwrap()).unwrap();
    /// assert_eq!(url.as_str(), "https://books.toscrape.com/catalogue/page-2.html");
    /// # }
    /// ```
    pub fn absolute_url(&self, link: &Link) -> Result<Url, UrlError> {
        self.base_url.join(link.as_str()).map_err(|e| UrlError::Join {
            link: link.to_string(),
            message: e.to_string(),
        })
    }

    /// Downloads a link without persisting it
    ///
    /// # Errors
    ///
    /// * `MirrorError::Http` - connection failure or body read failure
    /// * `MirrorError::Status` - any non-2xx response
    pub async fn get(&self, link: &Link) -> Result<Vec<u8>, MirrorError> {
        let url = self.absolute_url(link)?;
        tracing::trace!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| MirrorError::Http {
                link: link.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::Status {
                link: link.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| MirrorError::Http {
            link: link.clone(),
            source,
        })?;

        Ok(body.to_vec())
    }

    /// Downloads a link and persists it under the same link
    ///
    /// Returns the downloaded bytes so callers can parse them further.
    ///
    /// # Errors
    ///
    /// Everything [`Fetcher::get`] returns, plus `MirrorError::Persistence`
    /// when the storage backend fails.
    pub async fn save(&self, link: &Link) -> Result<Vec<u8>, MirrorError> {
        let body = self.get(link).await?;

        self.storage
            .store(link, &body)
            .await
            .map_err(|source| MirrorError::Persistence {
                link: link.clone(),
                source,
            })?;

        Ok(body)
    }
}
