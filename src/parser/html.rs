//! HTML parser for extracting links, readable text and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from `<a>`, `<img>` and canonical `<link>` tags)
//! - Text from content-bearing block elements
//! - Title, description and site name from `<meta>` tags

use super::{collapse_whitespace, PageMetadata, ParsedPage};
use crate::url::resolve_and_normalize;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose text is considered page content
const TEXT_ELEMENTS: &str = "h1, h2, h3, h4, h5, h6, p, li, pre, blockquote, dd, dl, dt, figcaption";

/// Parses HTML content and extracts links, text and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">`
/// - `<img src="...">`
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links (same page anchors)
/// - Anything that is not http/https after resolution
///
/// Links are normalized (query and fragment removed) and deduplicated in
/// document order.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The page URL, used to resolve relative links
///
/// # Example
///
/// ```
/// use strand_crawler::parser::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><p>Hi</p><a href="/page?x=1">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.metadata.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// assert_eq!(parsed.text, "Hi");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        links: extract_links(&document, base_url),
        text: extract_text(&document),
        metadata: extract_metadata(&document),
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let sources = [
        ("a[href]", "href"),
        ("img[src]", "src"),
        ("link[rel='canonical'][href]", "href"),
    ];

    for (css, attr) in sources {
        let Some(sel) = selector(css) else {
            continue;
        };

        for element in document.select(&sel) {
            if element.value().attr("download").is_some() {
                continue;
            }

            let Some(href) = element.value().attr(attr) else {
                continue;
            };

            if let Some(url) = resolve_link(href, base_url) {
                if seen.insert(url.as_str().to_string()) {
                    links.push(url);
                }
            }
        }
    }

    links
}

/// Resolves a link to an absolute frontier URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only references
/// - Invalid or non-HTTP(S) URLs
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    resolve_and_normalize(base_url, href)
}

fn extract_text(document: &Html) -> String {
    let Some(sel) = selector(TEXT_ELEMENTS) else {
        return String::new();
    };

    document
        .select(&sel)
        // Nested matches (a <p> inside an <li>) would otherwise repeat text
        .filter(|element| !has_text_ancestor(element))
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn has_text_ancestor(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| {
            matches!(
                ancestor.value().name(),
                "h1" | "h2"
                    | "h3"
                    | "h4"
                    | "h5"
                    | "h6"
                    | "p"
                    | "li"
                    | "pre"
                    | "blockquote"
                    | "dd"
                    | "dl"
                    | "dt"
                    | "figcaption"
            )
        })
}

fn extract_metadata(document: &Html) -> PageMetadata {
    let description = meta_content(document, "meta[name='description']")
        .or_else(|| meta_content(document, "meta[property='og:description']"));
    let site_name = meta_content(document, "meta[property='og:site_name']");
    let title = meta_content(document, "meta[property='og:title']").or_else(|| extract_title(document));

    PageMetadata {
        title,
        description,
        site_name,
    }
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .filter_map(|element| element.value().attr("content"))
        .map(collapse_whitespace)
        .find(|content| !content.is_empty())
}

/// Extracts the page title from the `<title>` element
fn extract_title(document: &Html) -> Option<String> {
    let sel = selector("title")?;

    document
        .select(&sel)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}
