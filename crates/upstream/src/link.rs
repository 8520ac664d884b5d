//! Pagination through RFC 8288 `Link` headers, as returned by the GitHub API:
//!
//! ```text
//! <https://api.github.com/search/code?q=x&page=2>; rel="next", <https://api.github.com/search/code?q=x&page=5>; rel="last"
//! ```

use std::collections::HashMap;

use url::Url;

/// Maps each `rel` in a `Link` header to the `page` query parameter of its
/// target. Links without a parseable page are skipped.
#[must_use]
pub fn pages(header: &str) -> HashMap<String, u32> {
    header
        .split(',')
        .filter_map(|link| {
            let mut parts = link.split(';');

            let target = parts
                .next()?
                .trim()
                .strip_prefix('<')?
                .strip_suffix('>')?;
            let page: u32 = Url::parse(target)
                .ok()?
                .query_pairs()
                .find(|(key, _)| key == "page")?
                .1
                .parse()
                .ok()?;

            let rel = parts.find_map(|param| {
                param
                    .trim()
                    .strip_prefix("rel=")
                    .map(|rel| rel.trim_matches('"').to_owned())
            })?;

            Some((rel, page))
        })
        .collect()
}

/// The page a `rel="next"` link points to, if any.
#[must_use]
pub fn next_page(header: &str) -> Option<u32> {
    pages(header).get("next").copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_next_and_last() {
        let header = r#"<https://api.github.com/search/code?q=deprecated&page=2>; rel="next", <https://api.github.com/search/code?q=deprecated&page=5>; rel="last""#;

        let pages = pages(header);
        assert_eq!(pages.get("next"), Some(&2));
        assert_eq!(pages.get("last"), Some(&5));
        assert_eq!(next_page(header), Some(2));
    }

    #[test]
    fn test_last_page_has_no_next() {
        let header = r#"<https://api.github.com/search/code?q=x&page=1>; rel="first", <https://api.github.com/search/code?q=x&page=4>; rel="prev""#;

        assert_eq!(next_page(header), None);
    }

    #[test]
    fn test_malformed_links_are_skipped() {
        let header = r#"garbage, <https://api.github.com/x?page=nope>; rel="next", <https://api.github.com/x?page=3>; rel="last""#;

        let pages = pages(header);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages.get("last"), Some(&3));
    }
}
