//! Statistics from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! frontier and document counts for `--stats`.

use crate::storage::{FrontierStore, SqliteStore, StoreResult, CRAWLED, QUEUE};

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// URLs waiting in the queue
    pub queued: u64,

    /// URLs committed as crawled, successful or not
    pub crawled: u64,

    /// Documents persisted
    pub documents: u64,

    /// Distinct hosts among persisted documents
    pub hosts: u64,

    /// Document counts per content type, largest first
    pub by_content_type: Vec<(String, u64)>,
}

impl CrawlStatistics {
    /// Share of crawled URLs that produced a document, in percent
    pub fn success_rate(&self) -> f64 {
        if self.crawled == 0 {
            0.0
        } else {
            (self.documents as f64 / self.crawled as f64) * 100.0
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The SQLite store to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StoreError)` - Failed to query statistics
pub fn load_statistics(store: &SqliteStore) -> StoreResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        queued: store.cardinality(QUEUE)?,
        crawled: store.cardinality(CRAWLED)?,
        documents: store.count_documents()?,
        hosts: store.count_document_hosts()?,
        by_content_type: store.count_documents_by_type()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Frontier:");
    println!("  Queued: {}", stats.queued);
    println!("  Crawled: {}", stats.crawled);
    println!();

    println!("Documents:");
    println!(
        "  Stored: {} ({:.1}% of crawled)",
        stats.documents,
        stats.success_rate()
    );
    println!("  Hosts: {}", stats.hosts);

    if !stats.by_content_type.is_empty() {
        println!();
        println!("By Content Type:");
        for (content_type, count) in &stats.by_content_type {
            println!("  {}: {}", content_type, count);
        }
    }
}
