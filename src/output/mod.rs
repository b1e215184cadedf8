//! Reporting on the state of a crawl database

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
