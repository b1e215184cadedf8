//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the batch loop that ties everything together:
//! - Seeding the frontier
//! - Loading and interleaving a batch
//! - Driving the batch through the throttle, permission, fetch, parse and
//!   persist stages
//! - Committing the batch and queueing the links it discovered
//! - Stopping cleanly between batches on shutdown

use super::stages::CrawlStages;
use super::PipelineItem;
use crate::config::{Config, CrawlerConfig};
use crate::frontier::{distribute, Frontier};
use crate::parser::{build_http_client, BasicParser, Parser};
use crate::pipeline::{Pipeline, StageOptions};
use crate::politeness::PolitenessGate;
use crate::storage::{DocumentSink, FrontierStore, SqliteStore, StoreResult};
use crate::{ItemError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Result of driving one batch through the pipeline
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Child links of every successfully crawled URL, possibly with repeats
    pub discovered: Vec<Url>,

    pub succeeded: usize,

    /// Items dropped for any reason, robots denials included
    pub failed: usize,

    /// Subset of `failed` refused by robots.txt
    pub denied: usize,
}

/// Summary of one load-crawl-commit cycle
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub batch_size: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub discovered: usize,
    pub queued: u64,
    pub duration: Duration,
}

/// Totals for a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub cycles: usize,
    pub committed: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// True when the run ended because of a shutdown request
    pub interrupted: bool,
}

/// Main crawler structure
pub struct Crawler<S> {
    frontier: Frontier<S>,
    stages: Arc<CrawlStages>,
    workers: usize,
    batch_size: usize,
}

impl Crawler<SqliteStore> {
    /// Builds a crawler backed by SQLite with the basic HTTP parser
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `store` - Holds the frontier sets and receives crawled documents
    pub fn from_config(config: &Config, store: Arc<SqliteStore>) -> Result<Self> {
        let client = build_http_client(&config.user_agent)?;
        let gate = PolitenessGate::new(client.clone(), &config.crawler, &config.user_agent);
        let parser = Arc::new(BasicParser::new(client));
        let frontier = Frontier::new(Arc::clone(&store), config.crawler.queue_prioritization);

        Ok(Self::new(frontier, gate, parser, store, &config.crawler))
    }
}

impl<S: FrontierStore + 'static> Crawler<S> {
    /// Creates a crawler from its collaborators
    pub fn new(
        frontier: Frontier<S>,
        gate: PolitenessGate,
        parser: Arc<dyn Parser>,
        sink: Arc<dyn DocumentSink>,
        settings: &CrawlerConfig,
    ) -> Self {
        Self {
            frontier,
            stages: Arc::new(CrawlStages {
                gate: Arc::new(gate),
                parser,
                sink,
                shutdown: CancellationToken::new(),
                timeout: settings.crawl_timeout(),
            }),
            workers: settings.workers.max(1),
            batch_size: settings.batch_size.max(1),
        }
    }

    pub fn frontier(&self) -> &Frontier<S> {
        &self.frontier
    }

    pub fn gate(&self) -> &PolitenessGate {
        &self.stages.gate
    }

    /// Token that stops the run when cancelled
    ///
    /// Cancelling also cancels every in-flight item. The current batch is then
    /// abandoned without being committed, so its URLs stay queued.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.stages.shutdown.clone()
    }

    /// Runs a synchronous frontier operation on the blocking thread pool
    async fn on_store<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Frontier<S>) -> StoreResult<T> + Send + 'static,
    {
        let frontier = self.frontier.clone();
        Ok(tokio::task::spawn_blocking(move || op(&frontier)).await??)
    }

    /// Drives a batch through the crawl stages and partitions the results
    pub async fn crawl_batch(&self, batch: Vec<Url>) -> BatchOutcome {
        let mut pipeline = self.pipeline(batch);
        let mut outcome = BatchOutcome::default();

        while let Some(result) = pipeline.next().await {
            match result {
                Ok(item) => {
                    outcome.succeeded += 1;
                    outcome.discovered.extend(item.into_links());
                }
                Err(e) => {
                    outcome.failed += 1;
                    if e.is_policy_denied() {
                        outcome.denied += 1;
                        tracing::debug!(url = e.url().unwrap_or("-"), "Url was not allowed to be crawled");
                    } else {
                        tracing::warn!(url = e.url().unwrap_or("-"), error = %e, "Unable to crawl");
                    }
                }
            }
        }

        outcome
    }

    fn pipeline(&self, batch: Vec<Url>) -> Pipeline<PipelineItem, ItemError> {
        let workers = self.workers;
        let throttle = Arc::clone(&self.stages);
        let permission = Arc::clone(&self.stages);
        let fetch = Arc::clone(&self.stages);
        let parse = Arc::clone(&self.stages);
        let persist = Arc::clone(&self.stages);

        Pipeline::from_items(batch.into_iter().map(PipelineItem::new))
            .stage(StageOptions::new("throttle", workers), move |item| {
                let stages = Arc::clone(&throttle);
                async move { stages.throttle(item).await }
            })
            .stage(StageOptions::new("permission", workers), move |item| {
                let stages = Arc::clone(&permission);
                async move { stages.permission(item).await }
            })
            .stage(StageOptions::new("fetch", workers), move |item| {
                let stages = Arc::clone(&fetch);
                async move { stages.fetch(item).await }
            })
            .stage(StageOptions::new("parse", workers), move |item| {
                let stages = Arc::clone(&parse);
                async move { stages.parse(item).await }
            })
            .stage(StageOptions::new("persist", workers), move |item| {
                let stages = Arc::clone(&persist);
                async move { stages.persist(item).await }
            })
    }

    /// Runs one load, crawl, commit and ingest cycle
    ///
    /// # Returns
    ///
    /// * `Ok(Some(summary))` - A batch was crawled and committed
    /// * `Ok(None)` - The queue is empty, or shutdown interrupted the batch
    /// * `Err(CrawlError)` - A frontier store operation failed
    pub async fn run_cycle(&self) -> Result<Option<CycleSummary>> {
        let start = Instant::now();

        let size = self.batch_size;
        let batch = self.on_store(move |frontier| frontier.load_batch(size)).await?;
        if batch.is_empty() {
            return Ok(None);
        }

        let batch = distribute(batch);
        let batch_size = batch.len();
        let outcome = self.crawl_batch(batch.clone()).await;

        if self.stages.shutdown.is_cancelled() {
            tracing::info!(batch_size, "Shutdown requested, batch left in queue");
            return Ok(None);
        }

        self.on_store(move |frontier| frontier.commit_batch(&batch))
            .await?;
        let discovered = outcome.discovered.len();
        let links = outcome.discovered;
        let queued = match self
            .on_store(move |frontier| frontier.ingest_discovered(&links))
            .await?
        {
            Some(len) => len,
            None => self.on_store(|frontier| frontier.queued()).await?,
        };

        let summary = CycleSummary {
            batch_size,
            succeeded: outcome.succeeded,
            failed: outcome.failed,
            discovered,
            queued,
            duration: start.elapsed(),
        };

        tracing::info!(
            batch = summary.batch_size,
            succeeded = summary.succeeded,
            failed = summary.failed,
            denied = outcome.denied,
            discovered = summary.discovered,
            queued = summary.queued,
            duration_ms = summary.duration.as_millis() as u64,
            "Finished batch"
        );

        Ok(Some(summary))
    }

    /// Seeds the frontier and crawls until the queue is empty or shutdown
    pub async fn run(&self, seeds: &[String], recover: bool) -> Result<RunSummary> {
        let seeds = seeds.to_vec();
        self.on_store(move |frontier| frontier.seed(&seeds, recover))
            .await?;

        let start = Instant::now();
        let mut summary = RunSummary::default();

        loop {
            if self.stages.shutdown.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            match self.run_cycle().await? {
                Some(cycle) => {
                    summary.cycles += 1;
                    summary.committed += cycle.batch_size;
                    summary.succeeded += cycle.succeeded;
                    summary.failed += cycle.failed;
                }
                None if self.stages.shutdown.is_cancelled() => {
                    summary.interrupted = true;
                    break;
                }
                None => {
                    tracing::info!("Queue is empty, crawl complete");
                    break;
                }
            }
        }

        tracing::info!(
            cycles = summary.cycles,
            committed = summary.committed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            interrupted = summary.interrupted,
            elapsed = ?start.elapsed(),
            "Crawl finished"
        );

        Ok(summary)
    }
}
