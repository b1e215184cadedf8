//! State carried by one URL through the crawl stages

use super::CrawlContext;
use crate::parser::{Fetched, ParsedPage};
use crate::url::host_key;
use url::Url;

/// One in-flight URL
///
/// Each stage fills in its part and hands the item on. A failing stage turns
/// the item into an `ItemError`, so an item that reaches the end of the
/// pipeline has gone through every stage.
#[derive(Debug)]
pub struct PipelineItem {
    pub url: Url,

    /// Politeness key of `url`
    pub host: String,

    /// Live from the permission check until the fetch completes
    pub ctx: Option<CrawlContext>,

    pub fetched: Option<Fetched>,

    pub page: Option<ParsedPage>,
}

impl PipelineItem {
    pub fn new(url: Url) -> Self {
        Self {
            host: host_key(&url),
            url,
            ctx: None,
            fetched: None,
            page: None,
        }
    }

    /// Child links found while parsing, empty before the parse stage
    pub fn into_links(self) -> Vec<Url> {
        self.page.map(|page| page.links).unwrap_or_default()
    }
}
