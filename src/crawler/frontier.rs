//! Per-topic page frontier discovery
//!
//! Starting from a topic's seed URL, the discoverer walks pagination links
//! breadth-first and returns every page of the topic exactly once, in page
//! order, each with a page number that stays the same from run to run.

use crate::crawler::{Fetcher, PaginationParser};
use crate::url::UrlCanonicalizer;
use crate::ArchiverError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use url::Url;

/// One page of a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierPage {
    /// 1-based page number
    pub number: u32,

    /// Canonical page URL
    pub url: Url,
}

/// The pages discovered for one topic during this run
#[derive(Debug, Default)]
pub struct Frontier {
    pages: Vec<FrontierPage>,
    complete: bool,
    bodies: HashMap<String, String>,
}

impl Frontier {
    /// Pages in archive order
    pub fn pages(&self) -> &[FrontierPage] {
        &self.pages
    }

    /// Page numbers in archive order
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.iter().map(|p| p.number).collect()
    }

    /// Number of pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns true if no page was discovered
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Returns false if any page could not be fetched or parsed during discovery
    ///
    /// An incomplete frontier may be missing pages, so the topic must not be
    /// marked fully archived from it.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Hands over the body fetched for `url` during discovery, if any
    pub fn take_body(&mut self, url: &Url) -> Option<String> {
        self.bodies.remove(url.as_str())
    }
}

/// Discovers the pages of a topic by following pagination links
pub struct FrontierDiscoverer {
    fetcher: Arc<dyn Fetcher>,
    parser: Arc<dyn PaginationParser>,
    urls: Arc<UrlCanonicalizer>,
}

impl FrontierDiscoverer {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        parser: Arc<dyn PaginationParser>,
        urls: Arc<UrlCanonicalizer>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            urls,
        }
    }

    /// Discovers the ordered, de-duplicated pages of a topic
    ///
    /// # Algorithm
    ///
    /// 1. Canonicalize the seed (relative seeds resolve against the forum base URL)
    /// 2. Breadth-first over pagination links, starting from the seed
    /// 3. Keep only links to the same topic; each canonical URL is visited once
    /// 4. Number pages by offset and page size, then order them
    ///
    /// # Errors
    ///
    /// Fails if the seed cannot be canonicalized, fetched or parsed. Failures
    /// on later pages are logged and leave the frontier incomplete.
    pub async fn discover(
        &self,
        seed_url: &str,
        sub_forum_id: u64,
    ) -> Result<Frontier, ArchiverError> {
        let seed = self.urls.canonicalize_seed(seed_url, sub_forum_id)?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<Url> = VecDeque::new();
        let mut discovered: Vec<Url> = Vec::new();
        let mut bodies: HashMap<String, String> = HashMap::new();
        let mut complete = true;

        seen.insert(seed.as_str().to_string());
        queue.push_back(seed.clone());
        discovered.push(seed.clone());

        while let Some(url) = queue.pop_front() {
            let is_seed = url == seed;

            let html = match self.fetcher.fetch(url.as_str()).await {
                Ok(html) => html,
                Err(e) if is_seed => return Err(e.into()),
                Err(e) => {
                    tracing::warn!("Frontier page {} could not be fetched: {}", url, e);
                    complete = false;
                    continue;
                }
            };

            let links = match self.parser.pagination_links(&html) {
                Ok(links) => links,
                Err(message) if is_seed => {
                    return Err(ArchiverError::HtmlParse {
                        url: url.to_string(),
                        message,
                    })
                }
                Err(message) => {
                    tracing::warn!("Frontier page {} could not be parsed: {}", url, message);
                    complete = false;
                    bodies.insert(url.as_str().to_string(), html);
                    continue;
                }
            };

            bodies.insert(url.as_str().to_string(), html);

            for href in links {
                let link = match self.urls.canonicalize(&href, &url, Some(sub_forum_id)) {
                    Ok(link) => link,
                    Err(e) => {
                        tracing::debug!("Skipping pagination link {} on {}: {}", href, url, e);
                        continue;
                    }
                };

                if !self.urls.same_document(&seed, &link) {
                    continue;
                }

                if seen.insert(link.as_str().to_string()) {
                    discovered.push(link.clone());
                    queue.push_back(link);
                }
            }
        }

        let (pages, all_numbered) = number_pages(&self.urls, discovered);
        if !all_numbered {
            tracing::warn!(
                "Some pages of {} have offsets that do not map to a page number",
                seed
            );
            complete = false;
        }

        tracing::debug!(
            "Discovered {} page(s) for {}{}",
            pages.len(),
            seed,
            if complete { "" } else { " (incomplete)" }
        );

        Ok(Frontier {
            pages,
            complete,
            bodies,
        })
    }
}

/// Assigns page numbers and orders pages by them
///
/// Numbers come from the pagination offset and the configured page size, so
/// they are the same in every run no matter which pages were reachable.
/// Pages whose offset cannot be numbered are dropped; the second value is
/// false if that happened. Pages that share a number with an
/// earlier-discovered page are dropped as duplicates.
fn number_pages(urls: &UrlCanonicalizer, discovered: Vec<Url>) -> (Vec<FrontierPage>, bool) {
    let mut all_numbered = true;
    let mut pages: Vec<FrontierPage> = Vec::with_capacity(discovered.len());

    for url in discovered {
        match urls.page_number(&url) {
            Some(number) => pages.push(FrontierPage { number, url }),
            None => {
                tracing::debug!(
                    "Dropping {}: offset {} does not map to a page number",
                    url,
                    urls.page_offset(&url)
                );
                all_numbered = false;
            }
        }
    }

    // Stable: ties keep discovery order
    pages.sort_by_key(|page| page.number);
    pages.dedup_by(|later, earlier| {
        if later.number == earlier.number {
            tracing::debug!("Dropping {}: same page as {}", later.url, earlier.url);
            true
        } else {
            false
        }
    });

    (pages, all_numbered)
}
