//! URL handling module for Forum-Archiver
//!
//! Every URL the archiver compares, stores in a frontier or turns into a
//! topic seed goes through [`UrlCanonicalizer`], so the same logical forum
//! page always maps to the same string no matter which relative path,
//! parameter order or session id the markup used.

mod normalize;

use crate::config::ForumConfig;
use crate::UrlError;
use url::Url;

pub use normalize::{canonicalize_url, QueryRules};

/// Canonicalizes forum links and reads ids out of them
#[derive(Debug, Clone)]
pub struct UrlCanonicalizer {
    base: Url,
    subforum_param: String,
    topic_param: String,
    page_param: String,
    posts_per_page: u64,
    session_params: Vec<String>,
}

impl UrlCanonicalizer {
    /// Creates a canonicalizer for the forum described by `config`
    ///
    /// # Errors
    ///
    /// Returns `UrlError::Parse` if the configured base URL is not absolute.
    pub fn new(config: &ForumConfig) -> Result<Self, UrlError> {
        let base = Url::parse(&config.base_url).map_err(|e| UrlError::Parse(e.to_string()))?;

        Ok(Self {
            base,
            subforum_param: config.subforum_param.clone(),
            topic_param: config.topic_param.clone(),
            page_param: config.page_param.clone(),
            posts_per_page: u64::from(config.posts_per_page.max(1)),
            session_params: config.session_params.clone(),
        })
    }

    /// The forum base URL
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolves `href` against `base` and canonicalizes the result
    ///
    /// When `sub_forum_id` is given and the link omits the sub-forum
    /// parameter, the parameter is attached so links copied out of different
    /// pages of the same sub-forum compare equal.
    pub fn canonicalize(
        &self,
        href: &str,
        base: &Url,
        sub_forum_id: Option<u64>,
    ) -> Result<Url, UrlError> {
        let href = href.trim();
        if href.is_empty() {
            return Err(UrlError::Malformed("empty link".to_string()));
        }

        let absolute = base
            .join(href)
            .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

        let rules = QueryRules {
            page_param: &self.page_param,
            session_params: &self.session_params,
            sub_forum: sub_forum_id.map(|id| (self.subforum_param.as_str(), id)),
        };

        canonicalize_url(absolute, &rules)
    }

    /// Canonicalizes a seed or listing URL taken from the index
    ///
    /// Relative URLs resolve against the forum base URL.
    pub fn canonicalize_seed(&self, seed: &str, sub_forum_id: u64) -> Result<Url, UrlError> {
        self.canonicalize(seed, &self.base, Some(sub_forum_id))
    }

    /// Reads the topic id carried by a URL
    pub fn topic_id(&self, url: &Url) -> Option<u64> {
        query_value(url, &self.topic_param).and_then(|v| v.parse().ok())
    }

    /// Reads the sub-forum id carried by a URL
    pub fn sub_forum_id(&self, url: &Url) -> Option<u64> {
        query_value(url, &self.subforum_param).and_then(|v| v.parse().ok())
    }

    /// Reads the pagination offset of a URL; pages without one are offset 0
    pub fn page_offset(&self, url: &Url) -> u64 {
        query_value(url, &self.page_param)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Maps a URL's pagination offset to its 1-based page number
    ///
    /// The number depends only on the offset and the configured page size,
    /// so a page keeps its number across runs. Returns `None` for offsets
    /// that are not a multiple of the page size or whose page number does
    /// not fit in a `u32`.
    pub fn page_number(&self, url: &Url) -> Option<u32> {
        let offset = self.page_offset(url);
        if offset % self.posts_per_page != 0 {
            return None;
        }

        (offset / self.posts_per_page)
            .checked_add(1)
            .and_then(|number| u32::try_from(number).ok())
    }

    /// Returns true if both URLs are pages of the same topic or listing
    ///
    /// Two canonical URLs are pages of one document when they share origin,
    /// path, topic id and sub-forum id; they may differ only in pagination.
    pub fn same_document(&self, a: &Url, b: &Url) -> bool {
        same_origin(a, b)
            && a.path() == b.path()
            && query_value(a, &self.topic_param) == query_value(b, &self.topic_param)
            && query_value(a, &self.subforum_param) == query_value(b, &self.subforum_param)
    }
}

/// Returns true if both URLs share scheme, host and port
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

fn query_value(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonicalizer() -> UrlCanonicalizer {
        UrlCanonicalizer::new(&ForumConfig::with_base_url("https://forum.example.com/"))
            .unwrap()
    }

    fn page(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn test_relative_link_resolves_against_page() {
        let urls = canonicalizer();
        let base = page("https://forum.example.com/viewtopic.php?f=2&t=10");
        let result = urls
            .canonicalize("./viewtopic.php?t=10&start=20", &base, Some(2))
            .unwrap();
        assert_eq!(
            result.as_str(),
            "https://forum.example.com/viewtopic.php?f=2&start=20&t=10"
        );
    }

    #[test]
    fn test_equivalent_links_canonicalize_identically() {
        let urls = canonicalizer();
        let base = page("https://forum.example.com/viewtopic.php?f=2&t=10");
        let a = urls
            .canonicalize("viewtopic.php?t=10&f=2&start=15", &base, Some(2))
            .unwrap();
        let b = urls
            .canonicalize(
                "/./viewtopic.php?start=15&sid=deadbeef&t=10",
                &base,
                Some(2),
            )
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_resolves_against_base() {
        let urls = canonicalizer();
        let seed = urls.canonicalize_seed("viewtopic.php?t=5", 9).unwrap();
        assert_eq!(
            seed.as_str(),
            "https://forum.example.com/viewtopic.php?f=9&t=5"
        );
    }

    #[test]
    fn test_empty_link_rejected() {
        let urls = canonicalizer();
        assert!(urls.canonicalize("   ", urls.base(), None).is_err());
    }

    #[test]
    fn test_non_http_link_rejected() {
        let urls = canonicalizer();
        assert!(urls
            .canonicalize("mailto:admin@example.com", urls.base(), None)
            .is_err());
    }

    #[test]
    fn test_ids_and_offset() {
        let urls = canonicalizer();
        let url = page("https://forum.example.com/viewtopic.php?f=3&t=77&start=30");
        assert_eq!(urls.topic_id(&url), Some(77));
        assert_eq!(urls.sub_forum_id(&url), Some(3));
        assert_eq!(urls.page_offset(&url), 30);
        assert_eq!(urls.page_number(&url), Some(3));

        let first = page("https://forum.example.com/viewtopic.php?f=3&t=77");
        assert_eq!(urls.page_offset(&first), 0);
    }

    #[test]
    fn test_same_document() {
        let urls = canonicalizer();
        let p1 = page("https://forum.example.com/viewtopic.php?f=3&t=77");
        let p2 = page("https://forum.example.com/viewtopic.php?f=3&start=15&t=77");
        let other_topic = page("https://forum.example.com/viewtopic.php?f=3&t=78");
        let other_host = page("https://mirror.example.com/viewtopic.php?f=3&t=77");

        assert!(urls.same_document(&p1, &p2));
        assert!(!urls.same_document(&p1, &other_topic));
        assert!(!urls.same_document(&p1, &other_host));
    }

    #[test]
    fn test_same_origin_with_default_port() {
        assert!(same_origin(
            &page("https://example.com/a"),
            &page("https://example.com:443/b")
        ));
        assert!(!same_origin(
            &page("http://example.com/a"),
            &page("https://example.com/a")
        ));
    }

    #[test]
    fn test_page_number_rejects_misaligned_offset() {
        let urls = canonicalizer();
        let url = page("https://forum.example.com/viewtopic.php?t=77&start=20");
        assert_eq!(urls.page_number(&url), None);
        let first = page("https://forum.example.com/viewtopic.php?t=77");
        assert_eq!(urls.page_number(&first), Some(1));
    }

    #[test]
    fn test_page_number_out_of_range() {
        let mut config = ForumConfig::with_base_url("https://forum.example.com/");
        config.posts_per_page = 1;
        let urls = UrlCanonicalizer::new(&config).unwrap();

        let huge = page("https://forum.example.com/viewtopic.php?t=1&start=18446744073709551615");
        assert_eq!(urls.page_number(&huge), None);
        let past_u32 = page("https://forum.example.com/viewtopic.php?t=1&start=4294967295");
        assert_eq!(urls.page_number(&past_u32), None);
        let last = page("https://forum.example.com/viewtopic.php?t=1&start=4294967294");
        assert_eq!(urls.page_number(&last), Some(u32::MAX));
    }
}
