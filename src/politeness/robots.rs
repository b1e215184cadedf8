//! Robots.txt policy for a single host
//!
//! Rule matching is delegated to the robotstxt crate. The `Crawl-delay`
//! directive is not part of the matcher, so it is read separately when the
//! policy is built.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Largest robots.txt body that is parsed; the remainder is ignored
pub const MAX_ROBOTS_BYTES: usize = 500 * 1024;

/// Upper bound applied to a robots.txt `Crawl-delay`
pub const MAX_ROBOTS_CRAWL_DELAY: Duration = Duration::from_secs(60);

/// Crawl permission rules for one host and one user agent token
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    rules: Rules,
    crawl_delay: Option<Duration>,
}

#[derive(Debug, Clone)]
enum Rules {
    AllowAll,
    DenyAll,
    Parsed(String),
}

impl RobotsPolicy {
    /// Builds a policy from a robots.txt body
    ///
    /// # Arguments
    ///
    /// * `content` - The raw robots.txt body, truncated to [`MAX_ROBOTS_BYTES`]
    /// * `agent` - The product token used to select a rule group
    pub fn parse(content: &str, agent: &str) -> Self {
        let content = truncate(content, MAX_ROBOTS_BYTES);
        let crawl_delay = parse_crawl_delay(content, agent);

        if content.trim().is_empty() {
            return Self {
                rules: Rules::AllowAll,
                crawl_delay,
            };
        }

        Self {
            rules: Rules::Parsed(content.to_string()),
            crawl_delay,
        }
    }

    /// A permissive policy, used for a missing robots.txt and fail-open fetch failures
    pub fn allow_all() -> Self {
        Self {
            rules: Rules::AllowAll,
            crawl_delay: None,
        }
    }

    /// A policy refusing every path, used for fail-closed fetch failures
    pub fn deny_all() -> Self {
        Self {
            rules: Rules::DenyAll,
            crawl_delay: None,
        }
    }

    /// Checks if a URL is allowed for the given user agent token
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path to check
    /// * `agent` - The product token, e.g. `StrandBot`
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        match &self.rules {
            Rules::AllowAll => true,
            Rules::DenyAll => false,
            Rules::Parsed(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, agent, url)
            }
        }
    }

    /// The `Crawl-delay` that applies to the agent this policy was built for
    pub fn crawl_delay(&self) -> Option<Duration> {
        self.crawl_delay
    }
}

fn truncate(content: &str, max: usize) -> &str {
    if content.len() <= max {
        return content;
    }

    let mut end = max;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

/// Reads the `Crawl-delay` for `agent`, preferring its own group over `*`
///
/// Consecutive `User-agent` lines form one group; the group ends at the next
/// `User-agent` line that follows any other directive.
fn parse_crawl_delay(content: &str, agent: &str) -> Option<Duration> {
    let agent = agent.to_lowercase();
    let mut group: Vec<String> = Vec::new();
    let mut group_open = false;
    let mut for_agent = None;
    let mut for_wildcard = None;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if !group_open {
                    group.clear();
                    group_open = true;
                }
                group.push(value.to_lowercase());
            }
            "crawl-delay" => {
                group_open = false;
                let Some(delay) = parse_delay_secs(value) else {
                    continue;
                };

                if group.iter().any(|ua| product_token(ua) == agent) {
                    for_agent = for_agent.or(Some(delay));
                } else if group.iter().any(|ua| ua == "*") {
                    for_wildcard = for_wildcard.or(Some(delay));
                }
            }
            _ => group_open = false,
        }
    }

    for_agent.or(for_wildcard)
}

/// Parses a `Crawl-delay` value in seconds, capped at [`MAX_ROBOTS_CRAWL_DELAY`]
fn parse_delay_secs(value: &str) -> Option<Duration> {
    let secs = value.parse::<f64>().ok().filter(|secs| *secs >= 0.0)?;
    let delay = Duration::try_from_secs_f64(secs).unwrap_or(MAX_ROBOTS_CRAWL_DELAY);
    Some(delay.min(MAX_ROBOTS_CRAWL_DELAY))
}

/// The product token of a `User-agent` value, e.g. `testbot` for `TestBot/2.1`
fn product_token(value: &str) -> &str {
    value
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .next()
        .unwrap_or_default()
}
