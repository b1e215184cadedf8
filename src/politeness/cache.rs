//! Process-wide robots.txt cache
//!
//! Each host gets one `OnceCell` inside a `DashMap`. The map's shard lock is
//! only held long enough to clone the cell handle, so concurrent first
//! callers for one host all await the same initialisation while other hosts
//! proceed untouched. Entries are never evicted.

use super::robots::{RobotsPolicy, MAX_ROBOTS_BYTES};
use crate::crawler::CrawlContext;
use crate::url::{host_key, robots_url};
use crate::ItemError;
use dashmap::DashMap;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

/// Lazily fetched, permanently cached robots policies keyed by host
#[derive(Debug)]
pub struct RobotsCache {
    client: Client,
    agent: String,
    fail_open: bool,
    entries: DashMap<String, Arc<OnceCell<RobotsPolicy>>>,
    fetches: AtomicUsize,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client carrying the crawler's user agent header
    /// * `agent` - Product token matched against `User-agent` groups
    /// * `fail_open` - Policy cached when robots.txt cannot be retrieved:
    ///   `true` allows everything, `false` denies everything
    pub fn new(client: Client, agent: impl Into<String>, fail_open: bool) -> Self {
        Self {
            client,
            agent: agent.into(),
            fail_open,
            entries: DashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Checks `url` against its host's policy, fetching robots.txt on first use
    pub async fn is_allowed(&self, url: &Url, ctx: &CrawlContext) -> bool {
        let cell = self.cell(&host_key(url));
        let policy = cell.get_or_init(|| self.load(url, ctx)).await;
        policy.is_allowed(url.as_str(), &self.agent)
    }

    /// Crawl-delay advertised by `host`, if its policy has been loaded
    pub fn crawl_delay(&self, host: &str) -> Option<Duration> {
        self.entries
            .get(host)
            .and_then(|cell| cell.get().and_then(RobotsPolicy::crawl_delay))
    }

    /// Number of hosts with a cached policy
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of robots.txt requests issued so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn cell(&self, host: &str) -> Arc<OnceCell<RobotsPolicy>> {
        if let Some(cell) = self.entries.get(host) {
            return Arc::clone(cell.value());
        }
        Arc::clone(self.entries.entry(host.to_string()).or_default().value())
    }

    async fn load(&self, url: &Url, ctx: &CrawlContext) -> RobotsPolicy {
        let robots = robots_url(url);
        self.fetches.fetch_add(1, Ordering::Relaxed);

        match ctx.run(url, self.download(&robots)).await {
            Ok(Some(body)) => {
                tracing::debug!(url = %robots, bytes = body.len(), "Loaded robots.txt");
                RobotsPolicy::parse(&body, &self.agent)
            }
            Ok(None) => {
                tracing::debug!(url = %robots, "No robots.txt, allowing all");
                RobotsPolicy::allow_all()
            }
            Err(e) => {
                tracing::error!(
                    url = %robots,
                    error = %e,
                    fail_open = self.fail_open,
                    "Unable to fetch robots.txt"
                );
                if self.fail_open {
                    RobotsPolicy::allow_all()
                } else {
                    RobotsPolicy::deny_all()
                }
            }
        }
    }

    /// Downloads a robots.txt body
    ///
    /// # Returns
    ///
    /// * `Ok(Some(body))` - 2xx response, body cut at [`MAX_ROBOTS_BYTES`]
    /// * `Ok(None)` - 4xx response, the host has no robots.txt
    /// * `Err(ItemError)` - Transport failure or any other status
    async fn download(&self, robots: &str) -> Result<Option<String>, ItemError> {
        let fetch_error = |source| ItemError::Fetch {
            url: robots.to_string(),
            source,
        };

        let mut response = self.client.get(robots).send().await.map_err(fetch_error)?;
        let status = response.status();

        if status.is_client_error() {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ItemError::Status {
                url: robots.to_string(),
                status: status.as_u16(),
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(fetch_error)? {
            body.extend_from_slice(&chunk);
            if body.len() >= MAX_ROBOTS_BYTES {
                body.truncate(MAX_ROBOTS_BYTES);
                break;
            }
        }

        Ok(Some(String::from_utf8_lossy(&body).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> CrawlContext {
        CrawlContext::new(&CancellationToken::new(), Duration::from_secs(5))
    }

    fn page(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_first_access_fetches_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /private")
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(RobotsCache::new(Client::new(), "TestBot", true));
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            let url = if i % 2 == 0 {
                page(&server, "/private/page")
            } else {
                page(&server, "/public")
            };
            handles.push(tokio::spawn(async move {
                let allowed = cache.is_allowed(&url, &ctx()).await;
                (url.path().starts_with("/private"), allowed)
            }));
        }

        for handle in handles {
            let (private, allowed) = handle.await.unwrap();
            assert_eq!(allowed, !private);
        }
        assert_eq!(cache.fetch_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let cache = RobotsCache::new(Client::new(), "TestBot", false);
        assert!(cache.is_allowed(&page(&server, "/a"), &ctx()).await);
        assert!(cache.is_allowed(&page(&server, "/b"), &ctx()).await);
    }

    #[tokio::test]
    async fn test_server_error_uses_failure_policy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let open = RobotsCache::new(Client::new(), "TestBot", true);
        assert!(open.is_allowed(&page(&server, "/a"), &ctx()).await);

        let closed = RobotsCache::new(Client::new(), "TestBot", false);
        assert!(!closed.is_allowed(&page(&server, "/a"), &ctx()).await);
    }

    #[tokio::test]
    async fn test_failure_is_cached_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let cache = RobotsCache::new(Client::new(), "TestBot", true);
        for p in ["/a", "/b", "/c"] {
            assert!(cache.is_allowed(&page(&server, p), &ctx()).await);
        }
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_slow_robots_times_out_fail_open() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let cache = RobotsCache::new(Client::new(), "TestBot", true);
        let short = CrawlContext::new(&CancellationToken::new(), Duration::from_millis(100));
        assert!(cache.is_allowed(&page(&server, "/x"), &short).await);
    }

    #[tokio::test]
    async fn test_crawl_delay_visible_after_load() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 2"))
            .mount(&server)
            .await;

        let cache = RobotsCache::new(Client::new(), "TestBot", true);
        let url = page(&server, "/");
        let host = host_key(&url);

        assert_eq!(cache.crawl_delay(&host), None);
        cache.is_allowed(&url, &ctx()).await;
        assert_eq!(cache.crawl_delay(&host), Some(Duration::from_secs(2)));
    }
}
