//! Storage traits and error types
//!
//! This module defines the set-store interface backing the frontier and the
//! sink that crawled documents are written to.

use crate::config::SelectionStrategy;
use crate::parser::PageMetadata;
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store connection lock was poisoned")]
    Poisoned,

    #[error("Store returned {got} replies for {expected} commands")]
    ReplyMismatch { expected: usize, got: usize },
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// One operation inside an atomic store batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCommand {
    /// Adds members to a named set; existing members are left as they are
    Add { set: String, members: Vec<String> },

    /// Replaces `destination` with `source \ subtract`
    DiffStore {
        destination: String,
        source: String,
        subtract: String,
    },

    /// Moves a member from one set to another if it is present in `from`
    Move {
        from: String,
        to: String,
        member: String,
    },
}

/// Reply to a single [`StoreCommand`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreReply {
    /// Members added (for `Add`) or the destination's new size (for `DiffStore`)
    Count(u64),
    /// Whether the member was present in the source set (for `Move`)
    Moved(bool),
}

/// Set-semantic store holding the frontier
///
/// Implementations must be safe to share across tasks. Commands passed
/// together to [`FrontierStore::execute`] are applied atomically: either all
/// of them take effect or none do.
pub trait FrontierStore: Send + Sync {
    /// Executes a batch of commands atomically, returning one reply per command
    fn execute(&self, commands: &[StoreCommand]) -> StoreResult<Vec<StoreReply>>;

    /// Returns up to `count` members of a set without removing them
    fn sample(
        &self,
        set: &str,
        count: usize,
        strategy: SelectionStrategy,
    ) -> StoreResult<Vec<String>>;

    /// Returns the number of members in a set
    fn cardinality(&self, set: &str) -> StoreResult<u64>;

    /// Checks whether a member is present in a set
    fn contains(&self, set: &str, member: &str) -> StoreResult<bool>;

    /// Adds members to a set, returning how many were new
    fn add(&self, set: &str, members: &[String]) -> StoreResult<u64> {
        let replies = self.execute(&[StoreCommand::Add {
            set: set.to_string(),
            members: members.to_vec(),
        }])?;
        match replies.first() {
            Some(StoreReply::Count(added)) => Ok(*added),
            _ => Err(StoreError::ReplyMismatch {
                expected: 1,
                got: replies.len(),
            }),
        }
    }

    /// Stores `source \ subtract` into `destination`, returning its new size
    fn diff_store(&self, destination: &str, source: &str, subtract: &str) -> StoreResult<u64> {
        let replies = self.execute(&[StoreCommand::DiffStore {
            destination: destination.to_string(),
            source: source.to_string(),
            subtract: subtract.to_string(),
        }])?;
        match replies.first() {
            Some(StoreReply::Count(size)) => Ok(*size),
            _ => Err(StoreError::ReplyMismatch {
                expected: 1,
                got: replies.len(),
            }),
        }
    }

    /// Moves a single member between sets
    fn move_member(&self, from: &str, to: &str, member: &str) -> StoreResult<bool> {
        let replies = self.execute(&[StoreCommand::Move {
            from: from.to_string(),
            to: to.to_string(),
            member: member.to_string(),
        }])?;
        match replies.first() {
            Some(StoreReply::Moved(moved)) => Ok(*moved),
            _ => Err(StoreError::ReplyMismatch {
                expected: 1,
                got: replies.len(),
            }),
        }
    }
}

/// A crawled document handed to a [`DocumentSink`]
#[derive(Debug, Clone)]
pub struct CrawledDocument<'a> {
    pub url: &'a Url,
    pub content_type: &'a str,
    pub raw: &'a [u8],
    pub text: &'a str,
    pub metadata: &'a PageMetadata,
    pub crawled_at: DateTime<Utc>,
}

/// Durable destination for crawled documents
///
/// Persisting the same URL twice overwrites the earlier document.
pub trait DocumentSink: Send + Sync {
    fn persist(&self, document: &CrawledDocument<'_>) -> StoreResult<()>;
}
