//! Just-in-time refresh of sub-forum listings
//!
//! The static index can miss topics created after it was built. Before a
//! sub-forum is archived, the refresher scans a bounded number of its live
//! listing pages and returns topics the index does not know yet.

use crate::crawler::{Fetcher, ListedTopic, PaginationParser, TopicExtractor};
use crate::index::{SubForum, Topic, TopicId};
use crate::url::UrlCanonicalizer;
use crate::{ArchiverError, ConfigError};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Decides whether a sub-forum listing should be re-scanned now
///
/// True iff refresh is enabled, the sub-forum has a live listing URL, and it
/// was either never refreshed or refreshed at least `min_interval` ago.
pub fn should_refresh(
    enabled: bool,
    sub_forum: &SubForum,
    last_attempt: Option<DateTime<Utc>>,
    min_interval: Duration,
    now: DateTime<Utc>,
) -> bool {
    if !enabled || sub_forum.listing_url.is_none() {
        return false;
    }

    match last_attempt {
        None => true,
        Some(last) => now - last >= min_interval,
    }
}

/// Scans live sub-forum listings for topics missing from the index
pub struct JitRefresher {
    fetcher: Arc<dyn Fetcher>,
    parser: Arc<dyn PaginationParser>,
    extractor: Arc<dyn TopicExtractor>,
    urls: Arc<UrlCanonicalizer>,
}

impl JitRefresher {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        parser: Arc<dyn PaginationParser>,
        extractor: Arc<dyn TopicExtractor>,
        urls: Arc<UrlCanonicalizer>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            extractor,
            urls,
        }
    }

    /// Returns topics listed live that are neither in `known` nor repeated
    ///
    /// # Arguments
    ///
    /// * `sub_forum` - The sub-forum to scan; must carry a listing URL
    /// * `known` - Ids of topics already indexed for it
    /// * `max_pages` - Upper bound on listing pages fetched (at least one)
    ///
    /// # Errors
    ///
    /// Fails if the listing URL is missing or invalid, or listing page 1
    /// cannot be fetched or parsed. Later listing pages that fail are
    /// logged and skipped.
    pub async fn refresh(
        &self,
        sub_forum: &SubForum,
        known: &HashSet<TopicId>,
        max_pages: u32,
    ) -> Result<Vec<Topic>, ArchiverError> {
        let listing = sub_forum.listing_url.as_deref().ok_or_else(|| {
            ArchiverError::Config(ConfigError::Validation(format!(
                "sub-forum {} has no listing URL",
                sub_forum.id
            )))
        })?;
        let first_url = self.urls.canonicalize_seed(listing, sub_forum.id)?;

        let first_html = self.fetcher.fetch(first_url.as_str()).await?;

        let mut seen: HashSet<TopicId> = HashSet::new();
        let mut new_topics = Vec::new();

        let listed = self
            .extractor
            .extract_topics(&first_html, &first_url)
            .map_err(|message| ArchiverError::HtmlParse {
                url: first_url.to_string(),
                message,
            })?;
        self.collect(sub_forum.id, listed, known, &mut seen, &mut new_topics);

        if max_pages > 1 {
            let extra = self.listing_pages(&first_url, &first_html, sub_forum.id);

            for url in extra.into_iter().take(max_pages as usize - 1) {
                let html = match self.fetcher.fetch(url.as_str()).await {
                    Ok(html) => html,
                    Err(e) => {
                        tracing::warn!("Skipping listing page {}: {}", url, e);
                        continue;
                    }
                };

                match self.extractor.extract_topics(&html, &url) {
                    Ok(listed) => {
                        self.collect(sub_forum.id, listed, known, &mut seen, &mut new_topics)
                    }
                    Err(message) => {
                        tracing::warn!("Skipping listing page {}: {}", url, message);
                    }
                }
            }
        }

        tracing::info!(
            "JIT refresh of sub-forum {} found {} new topic(s)",
            sub_forum.id,
            new_topics.len()
        );

        Ok(new_topics)
    }

    /// Further listing pages linked from page 1, ordered by offset
    fn listing_pages(&self, first_url: &Url, first_html: &str, sub_forum_id: u64) -> Vec<Url> {
        let hrefs = match self.parser.pagination_links(first_html) {
            Ok(hrefs) => hrefs,
            Err(message) => {
                tracing::warn!("No listing pagination on {}: {}", first_url, message);
                return Vec::new();
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(first_url.as_str().to_string());

        let mut pages: Vec<Url> = hrefs
            .iter()
            .filter_map(|href| {
                self.urls
                    .canonicalize(href, first_url, Some(sub_forum_id))
                    .map_err(|e| tracing::debug!("Skipping listing link {}: {}", href, e))
                    .ok()
            })
            .filter(|url| self.urls.same_document(first_url, url))
            .filter(|url| seen.insert(url.as_str().to_string()))
            .collect();

        pages.sort_by_key(|url| self.urls.page_offset(url));
        pages
    }

    fn collect(
        &self,
        sub_forum_id: u64,
        listed: Vec<ListedTopic>,
        known: &HashSet<TopicId>,
        seen: &mut HashSet<TopicId>,
        out: &mut Vec<Topic>,
    ) {
        for topic in listed {
            if known.contains(&topic.id) || !seen.insert(topic.id) {
                continue;
            }

            let seed_url = match self.urls.canonicalize(
                topic.url.as_str(),
                self.urls.base(),
                Some(sub_forum_id),
            ) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    tracing::debug!("Skipping listed topic {}: {}", topic.id, e);
                    continue;
                }
            };

            out.push(Topic {
                id: topic.id,
                sub_forum_id,
                title: topic.title,
                seed_url,
            });
        }
    }
}
