//! Per-item cancellation and deadline

use crate::ItemError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Stand-in deadline for timeouts too large to add to an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Cancellable, deadline-bound execution context for one in-flight URL
///
/// The context is a child of the run-wide shutdown token, so stopping the run
/// cancels every live context. Dropping a context cancels it, which releases
/// anything still waiting on it no matter how the owning stage exits.
#[derive(Debug)]
pub struct CrawlContext {
    token: CancellationToken,
    deadline: Instant,
}

impl CrawlContext {
    /// Creates a context expiring `timeout` from now
    pub fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            token: parent.child_token(),
            deadline: now.checked_add(timeout).unwrap_or(now + FAR_FUTURE),
        }
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Runs `fut` until it finishes, the deadline passes or the context is cancelled
    ///
    /// # Returns
    ///
    /// * The future's own result when it completes first
    /// * `ItemError::Cancelled` if the context (or the run) was cancelled
    /// * `ItemError::Timeout` if the deadline passed
    pub async fn run<T, F>(&self, url: &Url, fut: F) -> Result<T, ItemError>
    where
        F: Future<Output = Result<T, ItemError>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ItemError::Cancelled {
                url: url.to_string(),
            }),
            _ = tokio::time::sleep_until(self.deadline) => Err(ItemError::Timeout {
                url: url.to_string(),
            }),
            result = fut => result,
        }
    }
}

impl Drop for CrawlContext {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[tokio::test]
    async fn test_run_returns_inner_result() {
        let ctx = CrawlContext::new(&CancellationToken::new(), Duration::from_secs(5));
        let value = ctx.run(&url(), async { Ok::<_, ItemError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_times_out_at_deadline() {
        let ctx = CrawlContext::new(&CancellationToken::new(), Duration::from_millis(30));
        let result = ctx
            .run(&url(), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ItemError>(())
            })
            .await;
        assert!(matches!(result, Err(ItemError::Timeout { .. })));
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_context() {
        let parent = CancellationToken::new();
        let ctx = CrawlContext::new(&parent, Duration::from_secs(5));
        parent.cancel();

        assert!(ctx.is_cancelled());
        let result = ctx.run(&url(), async { Ok::<_, ItemError>(()) }).await;
        assert!(matches!(result, Err(ItemError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_drop_cancels_without_touching_parent() {
        let parent = CancellationToken::new();
        let ctx = CrawlContext::new(&parent, Duration::from_secs(5));
        let child = ctx.token.clone();

        drop(ctx);

        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
