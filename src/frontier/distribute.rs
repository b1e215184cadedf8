//! Same-host interleaving of a batch

use crate::url::host_key;
use std::collections::HashMap;
use url::Url;

/// Reorders a batch so that URLs of one host are spread across it
///
/// A host occurring `c` times in a batch of `n` gets the ideal indices
/// `floor(i * n / c)` for `i` in `0..c`. URLs are placed in input order at
/// their host's next ideal index; an occupied index is resolved by probing
/// forward, wrapping at `n`. The result is a permutation of the input.
///
/// # Example
///
/// ```
/// use strand_crawler::frontier::distribute;
/// use url::Url;
///
/// let urls: Vec<Url> = ["https://a.com/1", "https://a.com/2", "https://b.com/1", "https://b.com/2"]
///     .iter()
///     .map(|u| Url::parse(u).unwrap())
///     .collect();
///
/// let hosts: Vec<String> = distribute(urls)
///     .iter()
///     .map(|u| u.host_str().unwrap().to_string())
///     .collect();
/// assert_eq!(hosts, ["a.com", "b.com", "a.com", "b.com"]);
/// ```
pub fn distribute(urls: Vec<Url>) -> Vec<Url> {
    let n = urls.len();
    if n < 2 {
        return urls;
    }

    let hosts: Vec<String> = urls.iter().map(host_key).collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for host in &hosts {
        *counts.entry(host.as_str()).or_default() += 1;
    }

    let mut placed: HashMap<&str, usize> = HashMap::new();
    let mut slots: Vec<Option<Url>> = vec![None; n];

    for (url, host) in urls.into_iter().zip(&hosts) {
        let count = counts.get(host.as_str()).copied().unwrap_or(1);
        let nth = placed.entry(host.as_str()).or_default();

        let mut index = *nth * n / count;
        *nth += 1;

        while slots[index].is_some() {
            index = (index + 1) % n;
        }
        slots[index] = Some(url);
    }

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn urls(specs: &[(&str, usize)]) -> Vec<Url> {
        specs
            .iter()
            .flat_map(|(host, count)| {
                (0..*count).map(move |i| Url::parse(&format!("https://{}/{}", host, i)).unwrap())
            })
            .collect()
    }

    fn max_gap(output: &[Url], host: &str) -> usize {
        let positions: Vec<usize> = output
            .iter()
            .enumerate()
            .filter(|(_, u)| u.host_str() == Some(host))
            .map(|(i, _)| i)
            .collect();
        positions.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0)
    }

    #[test]
    fn test_empty_and_single() {
        assert!(distribute(Vec::new()).is_empty());
        let one = urls(&[("a.com", 1)]);
        assert_eq!(distribute(one.clone()), one);
    }

    #[test]
    fn test_output_is_permutation() {
        let input = urls(&[("a.com", 7), ("b.com", 3), ("c.com", 5), ("d.com", 1)]);
        let output = distribute(input.clone());

        assert_eq!(output.len(), input.len());
        let before: HashSet<_> = input.iter().map(Url::as_str).collect();
        let after: HashSet<_> = output.iter().map(Url::as_str).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_two_hosts_alternate() {
        let output = distribute(urls(&[("a.com", 4), ("b.com", 4)]));
        let hosts: Vec<_> = output.iter().map(|u| u.host_str().unwrap()).collect();
        assert_eq!(
            hosts,
            ["a.com", "b.com", "a.com", "b.com", "a.com", "b.com", "a.com", "b.com"]
        );
    }

    #[test]
    fn test_dominant_host_is_spread() {
        // Clustered input: all of a.com first
        let input = urls(&[("a.com", 10), ("b.com", 5), ("c.com", 5)]);
        let n = input.len();
        let output = distribute(input);

        let slack = 2;
        assert!(max_gap(&output, "a.com") <= (n + 9) / 10 + slack);
        assert!(max_gap(&output, "b.com") <= (n + 4) / 5 + slack);
        assert!(max_gap(&output, "c.com") <= (n + 4) / 5 + slack);
    }

    #[test]
    fn test_ports_are_distinct_hosts() {
        let input = vec![
            Url::parse("http://a.com:8080/1").unwrap(),
            Url::parse("http://a.com:8080/2").unwrap(),
            Url::parse("http://a.com/1").unwrap(),
            Url::parse("http://a.com/2").unwrap(),
        ];
        let output = distribute(input);
        let ports: Vec<_> = output.iter().map(|u| u.port()).collect();
        assert_eq!(ports, [Some(8080), None, Some(8080), None]);
    }
}
