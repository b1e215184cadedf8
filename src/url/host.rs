use url::Url;

/// Extracts the politeness key of a URL: its host, plus the port when one is given
///
/// Two URLs share crawl delays and robots.txt exactly when their host keys match.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use strand_crawler::url::host_key;
///
/// let url = Url::parse("https://example.com/path").unwrap();
/// assert_eq!(host_key(&url), "example.com");
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), "127.0.0.1:8080");
/// ```
pub fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}

/// Builds the robots.txt location for a URL's host
pub fn robots_url(url: &Url) -> String {
    format!("{}://{}/robots.txt", url.scheme(), host_key(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_host() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(host_key(&url), "example.com");
    }

    #[test]
    fn test_subdomain_is_distinct() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(host_key(&url), "blog.example.com");
    }

    #[test]
    fn test_explicit_port_kept() {
        let url = Url::parse("https://example.com:8443/").unwrap();
        assert_eq!(host_key(&url), "example.com:8443");
    }

    #[test]
    fn test_default_port_dropped() {
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(host_key(&url), "example.com");
    }

    #[test]
    fn test_robots_url() {
        let url = Url::parse("http://127.0.0.1:9000/deep/page").unwrap();
        assert_eq!(robots_url(&url), "http://127.0.0.1:9000/robots.txt");

        let url = Url::parse("https://Example.com/a").unwrap();
        assert_eq!(robots_url(&url), "https://example.com/robots.txt");
    }
}
