//! The five per-item crawl stages

use super::{CrawlContext, PipelineItem};
use crate::parser::Parser;
use crate::pipeline::StagePanic;
use crate::politeness::PolitenessGate;
use crate::storage::{CrawledDocument, DocumentSink};
use crate::ItemError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Collaborators shared by every worker of every stage
pub(crate) struct CrawlStages {
    pub(crate) gate: Arc<PolitenessGate>,
    pub(crate) parser: Arc<dyn Parser>,
    pub(crate) sink: Arc<dyn DocumentSink>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) timeout: Duration,
}

impl CrawlStages {
    /// Waits for the host's crawl-delay slot
    ///
    /// Only fails when shutdown interrupts the wait.
    pub(crate) async fn throttle(&self, item: PipelineItem) -> Result<PipelineItem, ItemError> {
        let host = item.host.clone();
        tokio::select! {
            slot = self.gate.wait_until_crawlable(&host) => {
                tracing::trace!(url = %item.url, slot = ?slot, "Crawl slot granted");
                Ok(item)
            }
            _ = self.shutdown.cancelled() => Err(ItemError::Cancelled {
                url: item.url.to_string(),
            }),
        }
    }

    /// Opens the item's context and checks robots.txt under it
    pub(crate) async fn permission(
        &self,
        mut item: PipelineItem,
    ) -> Result<PipelineItem, ItemError> {
        let ctx = CrawlContext::new(&self.shutdown, self.timeout);

        if !self.gate.is_allowed(&item.url, &ctx).await {
            return Err(ItemError::Disallowed {
                url: item.url.to_string(),
            });
        }

        item.ctx = Some(ctx);
        Ok(item)
    }

    /// Fetches the document; the context is released when this stage returns
    pub(crate) async fn fetch(&self, mut item: PipelineItem) -> Result<PipelineItem, ItemError> {
        let ctx = match item.ctx.take() {
            Some(ctx) => ctx,
            None => CrawlContext::new(&self.shutdown, self.timeout),
        };

        let fetched = self.parser.fetch(&item.url, &ctx).await?;
        tracing::debug!(
            url = %item.url,
            content_type = %fetched.content_type,
            kb = fetched.body.len() as f64 / 1000.0,
            "Fetched page"
        );

        item.fetched = Some(fetched);
        Ok(item)
    }

    pub(crate) async fn parse(&self, mut item: PipelineItem) -> Result<PipelineItem, ItemError> {
        let Some(fetched) = item.fetched.as_ref() else {
            return Err(ItemError::Parse {
                url: item.url.to_string(),
                message: "nothing was fetched".to_string(),
            });
        };

        let page = self.parser.parse(fetched, &item.url).await?;
        item.page = Some(page);
        Ok(item)
    }

    /// Writes the document to the sink on the blocking pool, then drops the raw body
    pub(crate) async fn persist(&self, item: PipelineItem) -> Result<PipelineItem, ItemError> {
        let url = item.url.to_string();
        let sink = Arc::clone(&self.sink);

        let mut item = tokio::task::spawn_blocking(move || write_document(sink.as_ref(), item))
            .await
            .map_err(|err| ItemError::Panicked {
                url: Some(url),
                panic: StagePanic::from_join_error("persist", err),
            })??;

        if let Some(page) = &item.page {
            tracing::debug!(url = %item.url, links = page.links.len(), "Crawled page");
        }
        item.fetched = None;
        Ok(item)
    }
}

fn write_document(sink: &dyn DocumentSink, item: PipelineItem) -> Result<PipelineItem, ItemError> {
    let (Some(fetched), Some(page)) = (item.fetched.as_ref(), item.page.as_ref()) else {
        return Err(ItemError::Parse {
            url: item.url.to_string(),
            message: "nothing was parsed".to_string(),
        });
    };

    let document = CrawledDocument {
        url: &item.url,
        content_type: &fetched.content_type,
        raw: &fetched.body,
        text: &page.text,
        metadata: &page.metadata,
        crawled_at: Utc::now(),
    };

    sink.persist(&document).map_err(|source| ItemError::Persist {
        url: item.url.to_string(),
        source,
    })?;

    Ok(item)
}
