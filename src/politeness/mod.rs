//! Politeness gate: robots.txt permission and per-host crawl delays
//!
//! Both halves are keyed by host and safe to call from any number of pipeline
//! workers at once. Robots policies are fetched at most once per host and kept
//! for the whole process; crawl-delay watermarks only ever move forward.

mod cache;
mod delay;
mod robots;

pub use cache::RobotsCache;
pub use delay::CrawlDelays;
pub use robots::{RobotsPolicy, MAX_ROBOTS_BYTES, MAX_ROBOTS_CRAWL_DELAY};

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::CrawlContext;
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Entry point used by the crawl stages to behave politely towards hosts
#[derive(Debug)]
pub struct PolitenessGate {
    robots: RobotsCache,
    delays: CrawlDelays,
    respect_robots: bool,
    default_delay: Duration,
}

impl PolitenessGate {
    /// Creates a gate
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests
    /// * `crawler` - Robots and delay settings
    /// * `user_agent` - Supplies the token matched against `User-agent` groups
    pub fn new(client: Client, crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Self {
        Self {
            robots: RobotsCache::new(
                client,
                user_agent.robots_token(),
                crawler.robots_fail_open,
            ),
            delays: CrawlDelays::new(),
            respect_robots: crawler.respect_robots,
            default_delay: crawler.default_crawl_delay(),
        }
    }

    /// Checks whether `url` may be crawled
    ///
    /// Always `true` when robots.txt is not respected. Otherwise the host's
    /// policy is fetched under `ctx` on first use and reused afterwards.
    pub async fn is_allowed(&self, url: &Url, ctx: &CrawlContext) -> bool {
        if !self.respect_robots {
            return true;
        }
        self.robots.is_allowed(url, ctx).await
    }

    /// Sleeps until `host` may receive its next request and returns the granted slot
    pub async fn wait_until_crawlable(&self, host: &str) -> Instant {
        self.delays.wait(host, self.effective_delay(host)).await
    }

    /// Delay applied between requests to `host`
    ///
    /// The configured default, raised to the host's robots.txt `Crawl-delay`
    /// (at most [`MAX_ROBOTS_CRAWL_DELAY`]) once its policy has been loaded.
    pub fn effective_delay(&self, host: &str) -> Duration {
        if !self.respect_robots {
            return self.default_delay;
        }

        match self.robots.crawl_delay(host) {
            Some(robots_delay) => robots_delay.max(self.default_delay),
            None => self.default_delay,
        }
    }
}
