//! Strand: a polite, batch-oriented web crawler
//!
//! This crate keeps a URL frontier in a set store, drives each batch through a
//! bounded-concurrency pipeline (throttle, permission, fetch, parse, persist)
//! and writes discovered links back to the frontier while respecting per-host
//! crawl delays and robots.txt.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod politeness;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for run-level failures
///
/// Anything surfacing as a `CrawlError` aborts the current run. Per-item
/// failures use [`ItemError`] instead and never leave the pipeline.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Store task failed: {0}")]
    StoreTask(#[from] tokio::task::JoinError),
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
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Failure of a single crawled item
///
/// These are dropped after logging; the URL is still committed as crawled.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("URL disallowed by robots.txt: {url}")]
    Disallowed { url: String },

    #[error("HTTP error for {url}: {source}")]
    Fetch { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Request cancelled for {url}")]
    Cancelled { url: String },

    #[error("No parser for content type '{content_type}' at {url}")]
    UnsupportedContent { url: String, content_type: String },

    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Failed to persist {url}: {source}")]
    Persist {
        url: String,
        source: storage::StoreError,
    },

    #[error("Item {} failed: {panic}", .url.as_deref().unwrap_or("(unknown)"))]
    Panicked {
        url: Option<String>,
        panic: pipeline::StagePanic,
    },
}

impl From<pipeline::StagePanic> for ItemError {
    fn from(panic: pipeline::StagePanic) -> Self {
        Self::Panicked { url: None, panic }
    }
}

impl ItemError {
    /// The URL of the item that failed
    ///
    /// `None` only for a panic inside a stage, where the item is lost.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Disallowed { url }
            | Self::Fetch { url, .. }
            | Self::Status { url, .. }
            | Self::Timeout { url }
            | Self::Cancelled { url }
            | Self::UnsupportedContent { url, .. }
            | Self::Parse { url, .. }
            | Self::Persist { url, .. } => Some(url),
            Self::Panicked { url, .. } => url.as_deref(),
        }
    }

    /// Returns true for robots.txt denials, which are expected and not operational errors
    pub fn is_policy_denied(&self) -> bool {
        matches!(self, Self::Disallowed { .. })
    }

    /// Returns true for network, timeout and non-2xx failures
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Status { .. } | Self::Timeout { .. } | Self::Cancelled { .. }
        )
    }
}

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, CrawlError>;


// Re-export commonly used types
pub use config::Config;
pub use crawler::Crawler;
pub use frontier::{distribute, Frontier};
pub use pipeline::{Pipeline, PipelineResult};
pub use politeness::PolitenessGate;
pub use url::{host_key, normalize_url};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_error_classification() {
        let denied = ItemError::Disallowed {
            url: "https://a.com/1".to_string(),
        };
        assert!(denied.is_policy_denied());
        assert!(!denied.is_transient());
        assert_eq!(denied.url(), Some("https://a.com/1"));

        let timeout = ItemError::Timeout {
            url: "https://b.com/".to_string(),
        };
        assert!(timeout.is_transient());
        assert!(!timeout.is_policy_denied());

        let unsupported = ItemError::UnsupportedContent {
            url: "https://c.com/x".to_string(),
            content_type: "application/zip".to_string(),
        };
        assert!(!unsupported.is_transient());
        assert!(unsupported.to_string().contains("application/zip"));

        let panicked = ItemError::from(pipeline::StagePanic {
            stage: "parse".into(),
            message: "boom".to_string(),
        });
        assert_eq!(panicked.url(), None);
        assert!(!panicked.is_transient());
        assert_eq!(
            panicked.to_string(),
            "Item (unknown) failed: stage 'parse' panicked: boom"
        );
    }
}
