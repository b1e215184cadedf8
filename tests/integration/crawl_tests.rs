//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive full
//! seed-to-empty-queue runs against a SQLite database on disk.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use strand_crawler::config::{parse_config, Config};
use strand_crawler::storage::{open_store, FrontierStore, SqliteStore, CRAWLED, QUEUE};
use strand_crawler::Crawler;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Builds a test configuration the way a user would write it
fn create_test_config(
    db_path: &Path,
    seeds: &[String],
    delay_ms: u64,
    respect_robots: bool,
    batch_size: usize,
) -> Config {
    let seeds = seeds
        .iter()
        .map(|s| format!("\"{}\"", s))
        .collect::<Vec<_>>()
        .join(", ");

    let toml = format!(
        r#"
seeds = [{seeds}]

[crawler]
workers = 4
batch-size = {batch_size}
crawl-timeout-ms = 2000
default-crawl-delay-ms = {delay_ms}
respect-robots = {respect_robots}
queue-prioritization = "oldest"

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{db}"
"#,
        db = db_path.display(),
    );

    parse_config(&toml).expect("Failed to parse test config")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

fn members(store: &SqliteStore, set: &str) -> HashSet<String> {
    store
        .members(set)
        .expect("Failed to read set")
        .into_iter()
        .collect()
}

async fn run_crawl(config: &Config) -> Arc<SqliteStore> {
    let store = Arc::new(
        open_store(Path::new(&config.output.database_path)).expect("Failed to open DB"),
    );
    let crawler =
        Crawler::from_config(config, Arc::clone(&store)).expect("Failed to create crawler");
    let summary = crawler
        .run(&config.seeds, config.crawler.recover)
        .await
        .expect("Crawl failed");
    assert!(!summary.interrupted);
    store
}

/// Records when each request reached the server
struct RecordArrivals {
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for RecordArrivals {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        html("<p>recorded</p>")
    }
}

#[tokio::test]
async fn test_full_crawl_two_hosts() {
    let host_a = MockServer::start().await;
    let host_b = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/1"))
        .respond_with(html("<p>a one</p>"))
        .expect(1)
        .mount(&host_a)
        .await;
    for page in ["/1", "/2"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html("<p>b page</p>"))
            .expect(1)
            .mount(&host_b)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let seeds = vec![
        format!("{}/1", host_a.uri()),
        format!("{}/1", host_b.uri()),
        format!("{}/2", host_b.uri()),
    ];
    let config = create_test_config(&dir.path().join("crawl.db"), &seeds, 0, false, 3);

    let store = run_crawl(&config).await;

    let expected: HashSet<String> = seeds.into_iter().collect();
    assert_eq!(members(&store, CRAWLED), expected);
    assert_eq!(store.cardinality(QUEUE).unwrap(), 0);
    assert_eq!(store.count_documents().unwrap(), 3);
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /1"))
        .expect(1)
        .mount(&server)
        .await;

    // Disallowed page must never be requested
    Mock::given(method("GET"))
        .and(path("/1"))
        .respond_with(html("<p>private</p>"))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/2"))
        .respond_with(html("<p>public</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seeds = vec![format!("{}/1", server.uri()), format!("{}/2", server.uri())];
    let config = create_test_config(&dir.path().join("crawl.db"), &seeds, 0, true, 10);

    let store = run_crawl(&config).await;

    // The denied URL is committed like any other so it is never retried
    let expected: HashSet<String> = seeds.into_iter().collect();
    assert_eq!(members(&store, CRAWLED), expected);
    assert_eq!(store.count_documents().unwrap(), 1);
}

#[tokio::test]
async fn test_crawl_delay_spaces_same_host_requests() {
    let server = MockServer::start().await;
    let arrivals = Arc::new(Mutex::new(Vec::new()));

    Mock::given(method("GET"))
        .respond_with(RecordArrivals {
            arrivals: Arc::clone(&arrivals),
        })
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seeds: Vec<String> = ["/a", "/b", "/c"]
        .iter()
        .map(|p| format!("{}{}", server.uri(), p))
        .collect();
    let config = create_test_config(&dir.path().join("crawl.db"), &seeds, 200, false, 10);

    // Every granted slot is at or after the first one, which is at or after `start`
    let start = Instant::now();
    run_crawl(&config).await;

    let mut arrivals = arrivals.lock().unwrap().clone();
    arrivals.sort();
    assert_eq!(arrivals.len(), 3);

    // The k-th request cannot start before k full delays after the first slot
    for (k, arrival) in arrivals.iter().enumerate() {
        let earliest = Duration::from_millis(200) * k as u32;
        let elapsed = arrival.duration_since(start);
        assert!(
            elapsed >= earliest,
            "request {} sent after {:?}, expected at least {:?}",
            k,
            elapsed,
            earliest
        );
    }
}

#[tokio::test]
async fn test_discovered_links_are_followed_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!(
            r#"<a href="{base}/a">A</a> <a href="/b?ref=home">B</a> <a href="/">Home</a>"#
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<a href="/">Home</a> <a href="/b">B</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(r#"<a href="/a#top">A</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seeds = vec![format!("{}/", base)];
    let config = create_test_config(&dir.path().join("crawl.db"), &seeds, 0, false, 10);

    let store = run_crawl(&config).await;

    let expected: HashSet<String> = ["/", "/a", "/b"]
        .iter()
        .map(|p| format!("{}{}", base, p))
        .collect();
    assert_eq!(members(&store, CRAWLED), expected);
    assert_eq!(store.cardinality(QUEUE).unwrap(), 0);
    assert_eq!(store.count_documents().unwrap(), 3);
}

#[tokio::test]
async fn test_failed_fetch_is_committed_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seeds = vec![format!("{}/broken", server.uri())];
    let config = create_test_config(&dir.path().join("crawl.db"), &seeds, 0, false, 10);

    let store = run_crawl(&config).await;

    assert!(store.contains(CRAWLED, &seeds[0]).unwrap());
    assert_eq!(store.cardinality(QUEUE).unwrap(), 0);
    assert_eq!(store.count_documents().unwrap(), 0);
}

#[tokio::test]
async fn test_recover_keeps_existing_queue() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/left-over"))
        .respond_with(html("<p>from last run</p>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/seed"))
        .respond_with(html("<p>seed</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let left_over = format!("{}/left-over", server.uri());
    {
        let store = open_store(&db_path).unwrap();
        store.add(QUEUE, &[left_over.clone()]).unwrap();
    }

    let seeds = vec![format!("{}/seed", server.uri())];
    let config = create_test_config(&db_path, &seeds, 0, false, 10);
    assert!(config.crawler.recover);

    let store = run_crawl(&config).await;

    assert!(store.contains(CRAWLED, &left_over).unwrap());
    assert!(!store.contains(CRAWLED, &seeds[0]).unwrap());
}
