//! HTML parser for extracting catalog links
//!
//! This module handles parsing fetched pages to extract:
//! - Product links and their thumbnails from list pages
//! - "Next" and "previous" pager links
//! - Category roots and stylesheets from the front page
//! - Gallery images from detail pages
//!
//! Raw hrefs come out of [`extract_links`]; every href is then resolved with
//! [`resolve_link`] against the page it was found on. Parsing is synchronous
//! and returns owned data, so no parsed document is ever held across an
//! `.await`.

use crate::config::{validate_selector, SelectorConfig};
use crate::url::resolve_link;
use crate::{ConfigError, Link, MirrorError, UrlError};
use scraper::{ElementRef, Html, Selector};

/// An href pulled out of a document, with the `src` of a nested image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// `href` of the element, or its `src` for elements without one
    pub href: String,

    /// `src` of the first `img` inside the element
    pub image: Option<String>,
}

/// Links found on one list page
///
/// Items and assets are resolved; pager hrefs are kept raw so the traversal
/// resolves them against the page it is on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    /// Detail pages, in document order
    pub items: Vec<Link>,

    /// Thumbnails, in document order
    pub assets: Vec<Link>,

    /// Raw href of the "next page" control
    pub next: Option<String>,

    /// Raw href of the "previous page" control
    pub previous: Option<String>,
}

/// Links found on the catalog's front page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootPage {
    /// Stylesheets referenced by the page
    pub stylesheets: Vec<Link>,

    /// Category list roots
    pub categories: Vec<Link>,
}

/// Selectors compiled once per run
#[derive(Debug)]
pub struct CompiledSelectors {
    product: Selector,
    next_page: Selector,
    previous_page: Selector,
    categories: Selector,
    stylesheets: Selector,
    gallery: Selector,
    image: Selector,
}

impl CompiledSelectors {
    /// Compiles every selector in the configuration
    pub fn compile(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            product: validate_selector(&config.product)?,
            next_page: validate_selector(&config.next_page)?,
            previous_page: validate_selector(&config.previous_page)?,
            categories: validate_selector(&config.categories)?,
            stylesheets: validate_selector(&config.stylesheets)?,
            gallery: validate_selector(&config.gallery)?,
            image: validate_selector("img")?,
        })
    }
}

/// Extracts every element matching `selector` as an [`ExtractedLink`]
///
/// Elements carrying neither `href` nor `src` are skipped. The first
/// descendant matching `image` supplies the thumbnail.
///
/// # Example
///
/// ```
/// use scraper::{Html, Selector};
/// use shelf_mirror::crawler::extract_links;
///
/// let doc = Html::parse_document(r#"<a href="item/index.html"><img src="item.jpg"></a>"#);
/// let anchors = Selector::parse("a").unwrap();
/// let images = Selector::parse("img").unwrap();
/// let links = extract_links(&doc, &anchors, &images);
/// assert_eq!(links[0].href, "item/index.html");
/// assert_eq!(links[0].image.as_deref(), Some("item.jpg"));
/// ```
pub fn extract_links(document: &Html, selector: &Selector, image: &Selector) -> Vec<ExtractedLink> {
    document
        .select(selector)
        .filter_map(|element| {
            let href = link_attr(&element)?;
            let image = element
                .select(image)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(str::to_string);
            Some(ExtractedLink { href, image })
        })
        .collect()
}

fn link_attr(element: &ElementRef<'_>) -> Option<String> {
    element
        .value()
        .attr("href")
        .or_else(|| element.value().attr("src"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn first_href(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().and_then(|e| link_attr(&e))
}

/// Resolves an href found on `page`
///
/// Links leaving the site (a scheme or host) and links resolving to nothing
/// are skipped. Backtracking above the site root means the page content is
/// broken and is reported as an extraction error.
fn resolve_on(page: &Link, href: &str) -> Result<Option<Link>, MirrorError> {
    match resolve_link(page.as_str(), href) {
        Ok(link) => Ok(Some(link)),
        Err(UrlError::NotRelative(_)) | Err(UrlError::Empty) => {
            tracing::debug!("Skipping non-site href '{}' on {}", href, page);
            Ok(None)
        }
        Err(e) => Err(MirrorError::Extraction {
            link: page.clone(),
            message: e.to_string(),
        }),
    }
}

fn resolve_all<'a>(
    page: &Link,
    hrefs: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<Link>, MirrorError> {
    let mut links = Vec::new();
    for href in hrefs {
        if let Some(link) = resolve_on(page, href)? {
            links.push(link);
        }
    }
    Ok(links)
}

/// Parses a list page into items, thumbnails and pager links
pub fn parse_list_page(
    body: &[u8],
    page: &Link,
    selectors: &CompiledSelectors,
) -> Result<PageResult, MirrorError> {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    let mut result = PageResult::default();

    for product in extract_links(&document, &selectors.product, &selectors.image) {
        tracing::trace!("product href={} img={:?}", product.href, product.image);

        if let Some(item) = resolve_on(page, &product.href)? {
            result.items.push(item);
        }
        if let Some(image) = product.image.as_deref() {
            if let Some(asset) = resolve_on(page, image)? {
                result.assets.push(asset);
            }
        }
    }

    result.next = first_href(&document, &selectors.next_page);
    result.previous = first_href(&document, &selectors.previous_page);

    Ok(result)
}

/// Parses the front page into stylesheets and category roots
pub fn parse_root_page(
    body: &[u8],
    page: &Link,
    selectors: &CompiledSelectors,
) -> Result<RootPage, MirrorError> {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    let stylesheets = extract_links(&document, &selectors.stylesheets, &selectors.image);
    let categories = extract_links(&document, &selectors.categories, &selectors.image);

    Ok(RootPage {
        stylesheets: resolve_all(page, stylesheets.iter().map(|l| l.href.as_str()))?,
        categories: resolve_all(page, categories.iter().map(|l| l.href.as_str()))?,
    })
}

/// Parses a detail page into its gallery images
pub fn parse_detail_page(
    body: &[u8],
    page: &Link,
    selectors: &CompiledSelectors,
) -> Result<Vec<Link>, MirrorError> {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    let images: Vec<String> = document
        .select(&selectors.gallery)
        .filter_map(|element| {
            // The gallery selector may target the images or a wrapper around them
            if element.value().name() == "img" {
                element.value().attr("src").map(str::to_string)
            } else {
                element
                    .select(&selectors.image)
                    .next()
                    .and_then(|img| img.value().attr("src"))
                    .map(str::to_string)
            }
        })
        .collect();

    resolve_all(page, images.iter().map(String::as_str))
}
