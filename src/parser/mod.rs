//! Content fetching and parsing
//!
//! The crawler only talks to the [`Parser`] trait. [`BasicParser`] is the
//! implementation shipped with the crate: it fetches over HTTP and dispatches
//! on the response's media type to the HTML, PDF or plain-text extractors.

mod basic;
mod html;
mod pdf;
mod text;

pub use basic::{build_http_client, BasicParser};
pub use html::parse_html;
pub use text::extract_text_links;

use crate::crawler::CrawlContext;
use crate::ItemError;
use async_trait::async_trait;
use url::Url;

/// Media type assumed when a response carries no Content-Type
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Raw response of a successful fetch
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Vec<u8>,

    /// Lowercased media type without parameters, e.g. `text/html`
    pub content_type: String,
}

/// Descriptive metadata pulled from a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_name: Option<String>,
}

/// Everything extracted from one document
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Normalized, deduplicated child URLs
    pub links: Vec<Url>,

    /// Readable text content
    pub text: String,

    pub metadata: PageMetadata,
}

/// Format-specific fetch and parse capability
///
/// Implementations are shared by every pipeline worker and must tolerate
/// concurrent calls for distinct items.
#[async_trait]
pub trait Parser: Send + Sync {
    /// Retrieves the raw bytes and media type of `url` under `ctx`
    async fn fetch(&self, url: &Url, ctx: &CrawlContext) -> Result<Fetched, ItemError>;

    /// Extracts links, text and metadata from a fetched document
    async fn parse(&self, fetched: &Fetched, origin: &Url) -> Result<ParsedPage, ItemError>;
}

/// Families of content the basic parser knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Pdf,
    Text,
    Image,
}

impl ContentKind {
    /// Classifies a normalized media type, `None` when unsupported
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "application/pdf" => Some(Self::Pdf),
            "text/plain" | "text/markdown" => Some(Self::Text),
            "image/jpeg" | "image/png" | "image/webp" | "image/gif" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Reduces a Content-Type header value to its bare media type
///
/// Parameters after `;` are dropped and the result is lowercased. A missing or
/// blank header yields [`DEFAULT_CONTENT_TYPE`].
pub fn media_type(header: Option<&str>) -> String {
    let essence = header
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    if essence.is_empty() {
        DEFAULT_CONTENT_TYPE.to_string()
    } else {
        essence.to_ascii_lowercase()
    }
}

/// Collapses runs of whitespace into single spaces and trims the ends
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
