//! Integration tests for the mirror
//!
//! These tests use wiremock to serve a small catalog and run the full
//! pipeline end-to-end into a temporary directory.

use shelf_mirror::cache::{LinkCache, LinkSet, LinkSink};
use shelf_mirror::config::{Config, SelectorConfig, SiteConfig};
use shelf_mirror::crawler::{
    build_http_client, collect_discoveries, CompiledSelectors, Coordinator, Fetcher, ListTraversal,
};
use shelf_mirror::output::Progress;
use shelf_mirror::storage::FsStorage;
use shelf_mirror::{ErrorKind, Link, MirrorError};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn link(p: &str) -> Link {
    Link::new(p).unwrap()
}

/// Builds a list page in the catalog's markup
fn list_page(
    stylesheets: &[&str],
    categories: &[&str],
    products: &[(&str, &str)],
    next: Option<&str>,
    previous: Option<&str>,
) -> String {
    let mut html = String::from("<html><head>");
    for href in stylesheets {
        html.push_str(&format!(
            r#"<link rel="stylesheet" type="text/css" href="{}" />"#,
            href
        ));
    }
    html.push_str(r#"</head><body><div class="side_categories"><ul>"#);
    for href in categories {
        html.push_str(&format!(r#"<li><a href="{}">category</a></li>"#, href));
    }
    html.push_str("</ul></div><ol>");
    for (href, img) in products {
        html.push_str(&format!(
            r#"<li><article class="product_pod"><div class="image_container"><a href="{}"><img src="{}" class="thumbnail"></a></div></article></li>"#,
            href, img
        ));
    }
    html.push_str(r#"</ol><ul class="pager">"#);
    if let Some(prev) = previous {
        html.push_str(&format!(r#"<li class="previous"><a href="{}">previous</a></li>"#, prev));
    }
    if let Some(next) = next {
        html.push_str(&format!(r#"<li class="next"><a href="{}">next</a></li>"#, next));
    }
    html.push_str("</ul></body></html>");
    html
}

/// Builds a detail page with a gallery
fn detail_page(images: &[&str]) -> String {
    let mut html = String::from(r#"<html><body><div id="product_gallery" class="carousel">"#);
    for src in images {
        html.push_str(&format!(r#"<div class="item active"><img src="{}" /></div>"#, src));
    }
    html.push_str("</div></body></html>");
    html
}

async fn serve(server: &MockServer, at: &str, body: impl Into<Vec<u8>>, times: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.into()))
        .expect(times)
        .mount(server)
        .await;
}

async fn fail(server: &MockServer, at: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Creates a test configuration writing below `data_dir`
fn create_test_config(server: &MockServer, data_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.site.base_url = server.uri();
    config.output.data_dir = data_dir.path().to_string_lossy().into_owned();
    config.crawler.category_workers = 2;
    config.crawler.asset_workers = 3;
    config.crawler.detail_workers = 3;
    config.crawler.request_timeout_secs = 5;
    config.output.progress_bars = false;
    config
}

#[tokio::test]
async fn test_two_page_catalog_traversal() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/catalogue/page-1.html",
        list_page(
            &[],
            &[],
            &[("a_1/index.html", "../media/a.jpg"), ("b_2/index.html", "../media/b.jpg")],
            Some("page-2.html"),
            None,
        ),
        2,
    )
    .await;
    serve(
        &server,
        "/catalogue/page-2.html",
        list_page(&[], &[], &[("c_3/index.html", "../media/c.jpg")], None, Some("page-1.html")),
        1,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let client = build_http_client(&Config::default().crawler).unwrap();
    let site = SiteConfig {
        base_url: server.uri(),
        ..SiteConfig::default()
    };
    let fetcher = Fetcher::new(client, &site, Arc::new(FsStorage::new(dir.path()))).unwrap();
    let traversal = ListTraversal::new(
        Arc::new(fetcher),
        Arc::new(CompiledSelectors::compile(&SelectorConfig::default()).unwrap()),
        Arc::new(Progress::silent()),
    );

    let pages = Arc::new(LinkCache::new());
    let assets = Arc::new(LinkCache::new());
    let (tx, rx) = mpsc::channel(8);
    let collector = tokio::spawn(collect_discoveries(rx, pages.clone(), assets.clone()));

    traversal
        .run(link("catalogue/page-1.html"), &tx, &CancellationToken::new())
        .await
        .unwrap();
    drop(tx);
    collector.await.unwrap();

    let mut items = pages.all();
    items.sort();
    assert_eq!(
        items,
        vec![
            link("catalogue/a_1/index.html"),
            link("catalogue/b_2/index.html"),
            link("catalogue/c_3/index.html"),
        ]
    );

    let mut thumbs = assets.all();
    thumbs.sort();
    assert_eq!(
        thumbs,
        vec![link("media/a.jpg"), link("media/b.jpg"), link("media/c.jpg")]
    );

    assert!(dir.path().join("catalogue/page-1.html").is_file());
    assert!(dir.path().join("catalogue/page-2.html").is_file());
}

#[tokio::test]
async fn test_full_mirror_of_small_catalog() {
    let server = MockServer::start().await;

    // Front page: read once for categories and once more by pagination
    serve(
        &server,
        "/index.html",
        list_page(
            &["static/css/styles.css"],
            &["catalogue/category/books/travel_2/index.html"],
            &[("catalogue/a_1/index.html", "media/a.jpg")],
            Some("catalogue/page-2.html"),
            None,
        ),
        2,
    )
    .await;
    serve(&server, "/static/css/styles.css", "body {}", 1).await;
    serve(
        &server,
        "/catalogue/page-2.html",
        list_page(&[], &[], &[("b_2/index.html", "../media/b.jpg")], None, Some("page-1.html")),
        1,
    )
    .await;
    serve(&server, "/catalogue/page-1.html", "<html></html>", 1).await;
    serve(
        &server,
        "/catalogue/category/books/travel_2/index.html",
        list_page(
            &[],
            &[],
            &[
                ("../../../c_3/index.html", "../../../../media/c.jpg"),
                ("../../../a_1/index.html", "../../../../media/a.jpg"),
            ],
            None,
            None,
        ),
        1,
    )
    .await;

    serve(
        &server,
        "/catalogue/a_1/index.html",
        detail_page(&["../../media/a-large.jpg", "../../media/shared.jpg"]),
        1,
    )
    .await;
    serve(&server, "/catalogue/b_2/index.html", detail_page(&["../../media/b.jpg"]), 1).await;
    serve(&server, "/catalogue/c_3/index.html", detail_page(&["../../media/shared.jpg"]), 1).await;

    serve(&server, "/media/a.jpg", "a", 1).await;
    serve(&server, "/media/b.jpg", "b", 1).await;
    serve(&server, "/media/c.jpg", "c", 1).await;
    serve(&server, "/media/a-large.jpg", "a-large", 1).await;
    serve(&server, "/media/shared.jpg", "shared", 1).await;

    let data_dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &data_dir);

    let coordinator = Coordinator::new(config).unwrap();
    let summary = coordinator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.detail_links, 3);
    assert_eq!(summary.asset_links, 6);
    assert_eq!(summary.counts.pages_parsed, 3);
    assert_eq!(summary.counts.detail_pages, 3);
    assert_eq!(summary.counts.assets_saved, 6);
    assert_eq!(summary.counts.cache_hits, 2);

    let out = coordinator.output_dir();
    assert_eq!(summary.output_dir, out);
    assert!(out.starts_with(data_dir.path()));
    for file in [
        "index.html",
        "static/css/styles.css",
        "catalogue/page-1.html",
        "catalogue/page-2.html",
        "catalogue/category/books/travel_2/index.html",
        "catalogue/a_1/index.html",
        "catalogue/b_2/index.html",
        "catalogue/c_3/index.html",
        "media/a.jpg",
        "media/a-large.jpg",
    ] {
        assert!(out.join(file).is_file(), "{} was not mirrored", file);
    }
    assert_eq!(std::fs::read(out.join("media/shared.jpg")).unwrap(), b"shared");
}

#[tokio::test]
async fn test_failed_category_aborts_run() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/index.html",
        list_page(
            &[],
            &["catalogue/category/books/travel_2/index.html"],
            &[("catalogue/a_1/index.html", "media/a.jpg")],
            None,
            None,
        ),
        2,
    )
    .await;
    fail(&server, "/catalogue/category/books/travel_2/index.html", 500).await;
    serve(&server, "/catalogue/a_1/index.html", detail_page(&[]), 0).await;
    serve(&server, "/media/a.jpg", "a", 0).await;

    let data_dir = tempfile::tempdir().unwrap();
    let coordinator = Coordinator::new(create_test_config(&server, &data_dir)).unwrap();

    let err = coordinator.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(
        err.link().unwrap().as_str(),
        "catalogue/category/books/travel_2/index.html"
    );
    assert!(matches!(err, MirrorError::WorkItem { .. }));
}

#[tokio::test]
async fn test_failed_detail_page_names_the_page() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/index.html",
        list_page(
            &[],
            &[],
            &[
                ("catalogue/a_1/index.html", "media/a.jpg"),
                ("catalogue/b_2/index.html", "media/b.jpg"),
            ],
            None,
            None,
        ),
        2,
    )
    .await;
    serve(&server, "/media/a.jpg", "a", 1).await;
    serve(&server, "/media/b.jpg", "b", 1).await;
    // Whether a_1 is reached depends on which page the pool picks first
    Mock::given(method("GET"))
        .and(path("/catalogue/a_1/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(&[])))
        .mount(&server)
        .await;
    fail(&server, "/catalogue/b_2/index.html", 404).await;

    let data_dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server, &data_dir);
    config.crawler.detail_workers = 1;
    let coordinator = Coordinator::new(config).unwrap();

    let err = coordinator.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.link().unwrap().as_str(), "catalogue/b_2/index.html");
}

#[tokio::test]
async fn test_link_above_site_root_is_an_extraction_error() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/index.html",
        list_page(&[], &[], &[("../outside/index.html", "media/x.jpg")], None, None),
        2,
    )
    .await;

    let data_dir = tempfile::tempdir().unwrap();
    let coordinator = Coordinator::new(create_test_config(&server, &data_dir)).unwrap();

    let err = coordinator.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Extraction);
    assert_eq!(err.link().unwrap().as_str(), "index.html");
}

#[tokio::test]
async fn test_self_referencing_pager_terminates() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/index.html",
        list_page(
            &[],
            &[],
            &[("catalogue/a_1/index.html", "media/a.jpg")],
            Some("index.html"),
            None,
        ),
        2,
    )
    .await;
    serve(&server, "/media/a.jpg", "a", 1).await;
    serve(&server, "/catalogue/a_1/index.html", detail_page(&[]), 1).await;

    let data_dir = tempfile::tempdir().unwrap();
    let coordinator = Coordinator::new(create_test_config(&server, &data_dir)).unwrap();

    let summary = coordinator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.counts.pages_parsed, 1);
    assert_eq!(summary.detail_links, 1);
    assert!(coordinator
        .detail_links()
        .contains(&link("catalogue/a_1/index.html")));
}

#[tokio::test]
async fn test_cancelled_run_stops_before_fetching() {
    let server = MockServer::start().await;
    serve(&server, "/index.html", "<html></html>", 0).await;

    let data_dir = tempfile::tempdir().unwrap();
    let coordinator = Coordinator::new(create_test_config(&server, &data_dir)).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = coordinator.run(&cancel).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancellation);
}
