//! Shelf-Mirror: a paginated catalog mirror
//!
//! This crate walks the list pages of a product catalog site, discovers the
//! detail pages and assets they reference, downloads everything and writes it
//! to a directory tree that mirrors the site's own path structure.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod output;
pub mod serve;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

pub use crate::url::Link;

/// Main error type for Shelf-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {link}: {source}")]
    Http {
        link: Link,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response code {status} for {link}")]
    Status { link: Link, status: u16 },

    #[error("Failed to extract links from {link}: {message}")]
    Extraction { link: Link, message: String },

    #[error("Failed to persist {link}: {source}")]
    Persistence {
        link: Link,
        #[source]
        source: storage::StorageError,
    },

    #[error("Work abandoned because a sibling worker failed or the run was cancelled")]
    Cancelled,

    #[error("Work item {item} failed: {source}")]
    WorkItem {
        item: Link,
        #[source]
        source: Box<MirrorError>,
    },

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid traversal transition: {from} -> {to}")]
    InvalidTransition {
        from: state::TraversalState,
        to: state::TraversalState,
    },

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`MirrorError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-2xx response or connection failure
    Transport,
    /// Content that could not be turned into links
    Extraction,
    /// Storage collaborator failure
    Persistence,
    /// Work abandoned because of cancellation
    Cancellation,
    /// Configuration, setup or runtime failures
    Other,
}

impl MirrorError {
    /// Returns the kind of the innermost error, looking through work item wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http { .. } | Self::Status { .. } => ErrorKind::Transport,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::Persistence { .. } => ErrorKind::Persistence,
            Self::Cancelled => ErrorKind::Cancellation,
            Self::WorkItem { source, .. } => source.kind(),
            _ => ErrorKind::Other,
        }
    }

    /// Returns the Link that caused the failure, if one is known
    ///
    /// The innermost Link wins: for a failed category traversal this is the
    /// page that could not be fetched, not the category root.
    pub fn link(&self) -> Option<&Link> {
        match self {
            Self::Http { link, .. }
            | Self::Status { link, .. }
            | Self::Extraction { link, .. }
            | Self::Persistence { link, .. } => Some(link),
            Self::WorkItem { item, source } => source.link().or(Some(item)),
            _ => None,
        }
    }

    /// Returns the work item a pool reported this error for, if any
    pub fn work_item(&self) -> Option<&Link> {
        match self {
            Self::WorkItem { item, .. } => Some(item),
            _ => None,
        }
    }

    /// Wraps an error with the work item it was raised for
    pub fn for_item(item: Link, source: MirrorError) -> Self {
        Self::WorkItem {
            item,
            source: Box::new(source),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Link resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Link '{rel}' backtracks above the site root from '{base}'")]
    EscapesRoot { base: String, rel: String },

    #[error("Link '{0}' is not site-relative")]
    NotRelative(String),

    #[error("Link is empty")]
    Empty,

    #[error("Failed to build URL for '{link}': {message}")]
    Join { link: String, message: String },
}

/// Result type alias for Shelf-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for link operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use cache::{LinkCache, LinkSet, LinkSink};
pub use config::Config;
pub use crawler::{run_mirror, Coordinator};
pub use output::CrawlSummary;
pub use state::TraversalState;
