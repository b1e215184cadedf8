use crate::UrlError;
use url::Url;

/// Schemes the crawler will ever enqueue
pub const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Normalizes a URL into its canonical frontier form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or relative
/// 2. Reject schemes outside the http/https allow-list
/// 3. Reject URLs without a host
/// 4. Empty path becomes `/` (the `url` crate already lowercases the host
///    and removes dot segments)
/// 5. Remove the query string
/// 6. Remove the fragment
///
/// The returned URL's string form is its identity in the frontier sets.
///
/// # Examples
///
/// ```
/// use strand_crawler::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.com/a/../page?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Resolves `href` against `base` and normalizes the result
///
/// Returns `None` for anything that cannot become a frontier URL.
pub fn resolve_and_normalize(base: &Url, href: &str) -> Option<Url> {
    let joined = base.join(href.trim()).ok()?;
    normalize_parsed(joined).ok()
}

fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    if url.path().is_empty() {
        url.set_path("/");
    }

    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}
