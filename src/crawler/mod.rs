//! Crawl orchestration
//!
//! This module drives batches of URLs through the fixed stage sequence:
//! - Throttle: wait for the host's crawl-delay slot
//! - Permission: open the item's context and check robots.txt
//! - Fetch: retrieve the document under that context
//! - Parse: extract links, text and metadata
//! - Persist: hand the document to the sink

mod context;
mod coordinator;
mod item;
mod stages;

pub use context::CrawlContext;
pub use coordinator::{BatchOutcome, Crawler, CycleSummary, RunSummary};
pub use item::PipelineItem;
