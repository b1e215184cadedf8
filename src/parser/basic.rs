//! HTTP-backed parser with media-type dispatch

use super::{html, media_type, pdf, text, ContentKind, Fetched, ParsedPage, Parser};
use crate::config::UserAgentConfig;
use crate::crawler::CrawlContext;
use crate::ItemError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// The overall request deadline comes from each item's [`CrawlContext`], so
/// only the connect phase gets a client-level timeout.
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Example
///
/// ```no_run
/// use strand_crawler::config::UserAgentConfig;
/// use strand_crawler::parser::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "StrandBot".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches over HTTP and parses HTML, PDF, plain text and images
#[derive(Debug, Clone)]
pub struct BasicParser {
    client: Client,
}

impl BasicParser {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }

    async fn get(&self, url: &Url) -> Result<Fetched, ItemError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if status.as_u16() >= 300 {
            return Err(ItemError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = media_type(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?
            .to_vec();

        Ok(Fetched { body, content_type })
    }
}

fn classify_error(url: &Url, error: reqwest::Error) -> ItemError {
    if error.is_timeout() {
        ItemError::Timeout {
            url: url.to_string(),
        }
    } else {
        ItemError::Fetch {
            url: url.to_string(),
            source: error,
        }
    }
}

#[async_trait]
impl Parser for BasicParser {
    async fn fetch(&self, url: &Url, ctx: &CrawlContext) -> Result<Fetched, ItemError> {
        ctx.run(url, self.get(url)).await
    }

    async fn parse(&self, fetched: &Fetched, origin: &Url) -> Result<ParsedPage, ItemError> {
        let kind = ContentKind::from_media_type(&fetched.content_type).ok_or_else(|| {
            ItemError::UnsupportedContent {
                url: origin.to_string(),
                content_type: fetched.content_type.clone(),
            }
        })?;

        match kind {
            ContentKind::Html => Ok(html::parse_html(
                &String::from_utf8_lossy(&fetched.body),
                origin,
            )),
            ContentKind::Pdf => pdf::parse_pdf(&fetched.body)
                .await
                .map_err(|message| ItemError::Parse {
                    url: origin.to_string(),
                    message,
                }),
            ContentKind::Text => Ok(text::parse_text(&fetched.body)),
            ContentKind::Image => Ok(ParsedPage::default()),
        }
    }
}
