//! Shelf-Mirror main entry point
//!
//! This is the command-line interface for the Shelf-Mirror catalog mirror.

use anyhow::Context;
use clap::Parser;
use shelf_mirror::config::{load_config_with_hash, validate, Config};
use shelf_mirror::output::print_summary;
use shelf_mirror::run_mirror;
use shelf_mirror::serve::{MirrorServer, DEFAULT_PORT};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Shelf-Mirror: a paginated catalog mirror
///
/// Shelf-Mirror walks every list page of a product catalog, downloads the
/// detail pages and images they reference, and writes everything into a
/// directory tree that mirrors the site's paths.
#[derive(Parser, Debug)]
#[command(name = "shelf-mirror")]
#[command(version)]
#[command(about = "A paginated catalog mirror", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Parent directory for run directories
    #[arg(long, value_name = "DIR")]
    data_dir: Option<String>,

    /// Site to mirror, overriding the configuration
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Validate config and show what would be mirrored without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Serve the finished mirror over HTTP until interrupted
    #[arg(long)]
    serve: bool,

    /// Port for --serve
    #[arg(long, value_name = "PORT", default_value_t = DEFAULT_PORT, requires = "serve")]
    port: u16,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if let Some(data_dir) = cli.data_dir {
        config.output.data_dir = data_dir;
    }
    if let Some(base_url) = cli.base_url {
        config.site.base_url = base_url;
    }
    if cli.quiet {
        config.output.progress_bars = false;
    }
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let output_dir = handle_mirror(config).await?;

    if cli.serve {
        handle_serve(&output_dir, cli.port).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelf_mirror=info,warn"),
            1 => EnvFilter::new("shelf_mirror=debug,info"),
            2 => EnvFilter::new("shelf_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Shelf-Mirror Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Root page: {}", config.site.root_page);

    println!("\nWorkers:");
    println!("  Categories: {}", config.crawler.category_workers);
    println!("  Assets: {}", config.crawler.asset_workers);
    println!("  Details: {}", config.crawler.detail_workers);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  User agent: {}", config.crawler.user_agent);

    println!("\nOutput:");
    println!(
        "  Run directory: {}/{}<timestamp>",
        config.output.data_dir, config.output.run_prefix
    );

    println!("\nSelectors:");
    println!("  Product: {}", config.selectors.product);
    println!("  Next page: {}", config.selectors.next_page);
    println!("  Previous page: {}", config.selectors.previous_page);
    println!("  Categories: {}", config.selectors.categories);
    println!("  Stylesheets: {}", config.selectors.stylesheets);
    println!("  Gallery: {}", config.selectors.gallery);

    println!("\n✓ Configuration is valid");
}

/// Handles the main mirror operation
///
/// Returns the run directory of the finished mirror.
async fn handle_mirror(config: Config) -> anyhow::Result<PathBuf> {
    tracing::info!("Mirroring {}", config.site.base_url);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after in-flight requests");
            on_interrupt.cancel();
        }
    });

    let result = run_mirror(config, &cancel).await;
    interrupt.abort();

    match result {
        Ok(summary) => {
            tracing::info!("Mirror completed successfully");
            print_summary(&summary);
            Ok(summary.output_dir)
        }
        Err(e) => {
            match e.link() {
                Some(link) => tracing::error!(kind = ?e.kind(), "Mirror failed at {}: {}", link, e),
                None => tracing::error!(kind = ?e.kind(), "Mirror failed: {}", e),
            }
            Err(e).context("mirror run failed")
        }
    }
}

/// Handles --serve: serves the run directory until Ctrl-C
async fn handle_serve(output_dir: &Path, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let server = MirrorServer::bind(output_dir, addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    server.run(&cancel).await.context("mirror server failed")
}
