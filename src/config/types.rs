use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    /// URLs the queue is seeded with on a fresh run
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Workers per pipeline stage
    pub workers: usize,

    /// Maximum number of URLs loaded from the queue per cycle
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Deadline for the robots check and page fetch of one item (milliseconds)
    #[serde(rename = "crawl-timeout-ms")]
    pub crawl_timeout_ms: u64,

    /// Minimum time between two requests to the same host (milliseconds)
    #[serde(rename = "default-crawl-delay-ms")]
    pub default_crawl_delay_ms: u64,

    /// Whether robots.txt is consulted at all
    #[serde(rename = "respect-robots")]
    pub respect_robots: bool,

    /// Policy cached when robots.txt cannot be fetched: allow everything (true) or nothing
    #[serde(rename = "robots-fail-open")]
    pub robots_fail_open: bool,

    /// Leave an already non-empty queue untouched instead of re-seeding
    pub recover: bool,

    /// How a batch is picked out of the queue
    #[serde(rename = "queue-prioritization")]
    pub queue_prioritization: SelectionStrategy,
}

impl CrawlerConfig {
    /// The per-item deadline as a Duration
    pub fn crawl_timeout(&self) -> Duration {
        Duration::from_millis(self.crawl_timeout_ms)
    }

    /// The default per-host delay as a Duration
    pub fn default_crawl_delay(&self) -> Duration {
        Duration::from_millis(self.default_crawl_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 50,
            batch_size: 100,
            crawl_timeout_ms: 5_000,
            default_crawl_delay_ms: 500,
            respect_robots: true,
            robots_fail_open: true,
            recover: true,
            queue_prioritization: SelectionStrategy::Random,
        }
    }
}

/// Strategy used to pick a batch out of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Uniform random sample
    #[default]
    Random,
    /// Longest-waiting URLs first
    Oldest,
    /// Most recently discovered URLs first
    Newest,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the product token matched against robots.txt groups
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Full User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }

    /// Token used to select a robots.txt group
    pub fn robots_token(&self) -> &str {
        &self.crawler_name
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding the frontier and crawled documents
    #[serde(rename = "database-path")]
    pub database_path: String,
}
