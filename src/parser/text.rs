//! Link extraction from unstructured text

use super::ParsedPage;
use crate::url::normalize_url;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

fn url_regex() -> &'static Regex {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    URL_RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"'`()\[\]{}|\\^]+"#).expect("url regex is valid")
    })
}

/// Finds absolute http/https URLs in free text
///
/// Trailing sentence punctuation is not treated as part of a URL. Results are
/// normalized and deduplicated in order of first appearance.
pub fn extract_text_links(text: &str) -> Vec<Url> {
    let mut seen = HashSet::new();

    url_regex()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']))
        .filter_map(|candidate| normalize_url(candidate).ok())
        .filter(|url| seen.insert(url.as_str().to_string()))
        .collect()
}

/// Builds a page from plain text or markdown
pub(super) fn parse_text(body: &[u8]) -> ParsedPage {
    let text = String::from_utf8_lossy(body).into_owned();
    ParsedPage {
        links: extract_text_links(&text),
        text,
        metadata: Default::default(),
    }
}
