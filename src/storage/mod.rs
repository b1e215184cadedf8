//! Storage module for the frontier and crawled documents
//!
//! This module handles all database operations for the crawler:
//! - Named-set operations backing the `queue` and `crawled` frontier sets
//! - Atomic multi-command batches (commit-and-requeue)
//! - Durable, overwrite-on-repeat document persistence

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{
    CrawledDocument, DocumentSink, FrontierStore, StoreCommand, StoreError, StoreReply,
    StoreResult,
};

use std::path::Path;

/// Name of the set holding URLs waiting to be crawled
pub const QUEUE: &str = "queue";

/// Name of the set holding URLs that are terminally crawled
pub const CRAWLED: &str = "crawled";

/// Opens (or creates) the SQLite database at `path`
pub fn open_store(path: &Path) -> StoreResult<SqliteStore> {
    SqliteStore::new(path)
}
