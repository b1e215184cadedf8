//! Strand main entry point
//!
//! This is the command-line interface for the Strand batch crawler.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strand_crawler::config::{load_config_with_hash, Config};
use strand_crawler::output::{load_statistics, print_statistics};
use strand_crawler::storage::open_store;
use strand_crawler::Crawler;
use tracing_subscriber::EnvFilter;

/// Strand: a polite, batch-oriented web crawler
///
/// Strand keeps its frontier in SQLite, crawls it in batches while respecting
/// robots.txt and per-host crawl delays, and stores every fetched document.
#[derive(Parser, Debug)]
#[command(name = "strand")]
#[command(version)]
#[command(about = "A polite, batch-oriented web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Seed the queue again even if it still holds URLs from a previous run
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config).with_context(|| {
        format!("Failed to load configuration from {}", cli.config.display())
    })?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config, cli.fresh);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("strand_crawler=info,strand=info,warn"),
            1 => EnvFilter::new("strand_crawler=debug,strand=debug,info"),
            2 => EnvFilter::new("strand_crawler=trace,strand=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, fresh: bool) {
    let crawler = &config.crawler;

    println!("=== Strand Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers per stage: {}", crawler.workers);
    println!("  Batch size: {}", crawler.batch_size);
    println!("  Crawl timeout: {}ms", crawler.crawl_timeout_ms);
    println!("  Default crawl delay: {}ms", crawler.default_crawl_delay_ms);
    println!("  Respect robots.txt: {}", crawler.respect_robots);
    println!(
        "  On robots.txt failure: {}",
        if crawler.robots_fail_open { "allow all" } else { "deny all" }
    );
    println!("  Recover existing queue: {}", crawler.recover && !fresh);
    println!("  Queue prioritization: {:?}", crawler.queue_prioritization);

    println!("\nUser Agent:");
    println!("  Header: {}", config.user_agent.header_value());
    println!("  Robots token: {}", config.user_agent.robots_token());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed URLs", config.seeds.len());
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&store).context("Failed to load statistics")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> Result<()> {
    let recover = config.crawler.recover && !fresh;
    if fresh {
        tracing::info!("Starting fresh crawl (re-seeding queue)");
    }
    tracing::info!(
        seeds = config.seeds.len(),
        workers = config.crawler.workers,
        batch_size = config.crawler.batch_size,
        "Starting crawl"
    );

    let store = Arc::new(
        open_store(Path::new(&config.output.database_path)).with_context(|| {
            format!("Failed to open database {}", config.output.database_path)
        })?,
    );
    let crawler = Crawler::from_config(&config, store).context("Failed to build crawler")?;

    let shutdown = crawler.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping; the current batch stays queued");
            shutdown.cancel();
        }
    });

    match crawler.run(&config.seeds, recover).await {
        Ok(summary) => {
            if summary.interrupted {
                tracing::info!("Crawl interrupted, run again to continue from the queue");
            } else {
                tracing::info!("Crawl completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
