//! Frontier management over the `queue` and `crawled` sets
//!
//! The frontier is partitioned into two disjoint sets held by a
//! [`FrontierStore`]. Every write that could put a crawled URL back into the
//! queue is paired, in the same atomic batch, with `queue = queue \ crawled`.

mod distribute;

pub use distribute::distribute;

use crate::config::SelectionStrategy;
use crate::storage::{FrontierStore, StoreCommand, StoreReply, StoreResult, CRAWLED, QUEUE};
use crate::url::normalize_url;
use std::sync::Arc;
use url::Url;

/// Batch-level view of the frontier
pub struct Frontier<S> {
    store: Arc<S>,
    strategy: SelectionStrategy,
}

impl<S> Clone for Frontier<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            strategy: self.strategy,
        }
    }
}

impl<S: FrontierStore> Frontier<S> {
    pub fn new(store: Arc<S>, strategy: SelectionStrategy) -> Self {
        Self { store, strategy }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Picks up to `size` URLs from the queue without removing them
    ///
    /// An empty result means the crawl is complete. Queue members that no
    /// longer parse as frontier URLs are moved straight to `crawled` so they
    /// cannot be selected forever.
    pub fn load_batch(&self, size: usize) -> StoreResult<Vec<Url>> {
        let members = self.store.sample(QUEUE, size, self.strategy)?;

        let mut batch = Vec::with_capacity(members.len());
        let mut invalid = Vec::new();
        for member in members {
            match normalize_url(&member) {
                Ok(url) if url.as_str() == member => batch.push(url),
                _ => {
                    tracing::warn!(member = %member, "Dropping malformed queue entry");
                    invalid.push(member);
                }
            }
        }

        if !invalid.is_empty() {
            self.store
                .execute(&move_commands(invalid.iter().map(String::as_str)))?;
        }

        Ok(batch)
    }

    /// Moves every URL of a batch from `queue` to `crawled` in one transaction
    ///
    /// URLs are committed whether or not their crawl succeeded. Returns the
    /// number of URLs that were still queued.
    pub fn commit_batch(&self, urls: &[Url]) -> StoreResult<usize> {
        if urls.is_empty() {
            return Ok(0);
        }

        let replies = self
            .store
            .execute(&move_commands(urls.iter().map(Url::as_str)))?;

        Ok(replies
            .iter()
            .filter(|reply| matches!(reply, StoreReply::Moved(true)))
            .count())
    }

    /// Queues newly discovered URLs, minus anything already crawled
    ///
    /// # Returns
    ///
    /// * `Ok(Some(len))` - The queue length after ingestion
    /// * `Ok(None)` - Nothing to ingest, no store command was issued
    pub fn ingest_discovered(&self, urls: &[Url]) -> StoreResult<Option<u64>> {
        if urls.is_empty() {
            tracing::warn!("No new urls");
            return Ok(None);
        }

        let members: Vec<String> = urls.iter().map(|url| url.to_string()).collect();
        let replies = self.store.execute(&[
            StoreCommand::Add {
                set: QUEUE.to_string(),
                members,
            },
            StoreCommand::DiffStore {
                destination: QUEUE.to_string(),
                source: QUEUE.to_string(),
                subtract: CRAWLED.to_string(),
            },
        ])?;

        Ok(match replies.last() {
            Some(StoreReply::Count(len)) => Some(*len),
            _ => None,
        })
    }

    /// Initializes the queue from the seed list
    ///
    /// With `recover` set, a non-empty queue is left untouched. Otherwise the
    /// seeds are queued again, taking them out of `crawled` if a previous run
    /// had already committed them.
    ///
    /// Returns the number of seeds written.
    pub fn seed(&self, seeds: &[String], recover: bool) -> StoreResult<usize> {
        if seeds.is_empty() {
            tracing::warn!("No seed urls configured");
            return Ok(0);
        }

        let queued = self.store.cardinality(QUEUE)?;
        if recover && queued > 0 {
            tracing::info!(queued, "Recovering existing queue, seeds ignored");
            return Ok(0);
        }

        let seeds: Vec<String> = seeds
            .iter()
            .filter_map(|seed| match normalize_url(seed) {
                Ok(url) => Some(url.to_string()),
                Err(e) => {
                    tracing::warn!(seed = %seed, error = %e, "Skipping invalid seed");
                    None
                }
            })
            .collect();

        let mut commands: Vec<StoreCommand> = seeds
            .iter()
            .map(|seed| StoreCommand::Move {
                from: CRAWLED.to_string(),
                to: QUEUE.to_string(),
                member: seed.clone(),
            })
            .collect();
        commands.push(StoreCommand::Add {
            set: QUEUE.to_string(),
            members: seeds.clone(),
        });

        self.store.execute(&commands)?;
        tracing::info!(seeds = seeds.len(), "Seeded queue");
        Ok(seeds.len())
    }

    /// Number of URLs waiting in the queue
    pub fn queued(&self) -> StoreResult<u64> {
        self.store.cardinality(QUEUE)
    }

    /// Number of URLs committed as crawled
    pub fn crawled(&self) -> StoreResult<u64> {
        self.store.cardinality(CRAWLED)
    }
}

fn move_commands<'a>(members: impl Iterator<Item = &'a str>) -> Vec<StoreCommand> {
    members
        .map(|member| StoreCommand::Move {
            from: QUEUE.to_string(),
            to: CRAWLED.to_string(),
            member: member.to_string(),
        })
        .collect()
}
