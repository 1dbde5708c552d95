//! HTML parsers for forum markup
//!
//! This module handles parsing HTML content to extract:
//! - Pagination links of a topic or listing page
//! - Topic links (id, title, URL) of a sub-forum listing page
//!
//! Both are capability traits so discovery and refresh can be tested with
//! fakes; the scraper-based implementations take their CSS selectors from
//! the forum configuration.

use crate::config::ForumConfig;
use crate::ConfigError;
use scraper::{Html, Selector};
use url::Url;

/// A topic link found on a sub-forum listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedTopic {
    /// Topic id read from the link
    pub id: u64,

    /// Link text
    pub title: String,

    /// Absolute (not yet canonical) topic URL
    pub url: Url,
}

/// Extracts pagination hrefs from a page
pub trait PaginationParser: Send + Sync {
    /// Returns the raw `href` values of every pagination anchor, in document order
    fn pagination_links(&self, html: &str) -> Result<Vec<String>, String>;
}

/// Extracts topic links from a sub-forum listing page
pub trait TopicExtractor: Send + Sync {
    /// Returns the topics linked from `html`, resolving hrefs against `page_url`
    fn extract_topics(&self, html: &str, page_url: &Url) -> Result<Vec<ListedTopic>, String>;
}

/// Pagination parser driven by a CSS selector
#[derive(Debug)]
pub struct HtmlPaginationParser {
    selector: Selector,
}

impl HtmlPaginationParser {
    /// Creates a parser from a CSS selector matching pagination anchors
    pub fn new(selector: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            selector: parse_selector(selector)?,
        })
    }

    /// Creates a parser from the forum configuration
    pub fn from_config(config: &ForumConfig) -> Result<Self, ConfigError> {
        Self::new(&config.pagination_selector)
    }
}

impl PaginationParser for HtmlPaginationParser {
    fn pagination_links(&self, html: &str) -> Result<Vec<String>, String> {
        let document = Html::parse_document(html);

        let links = document
            .select(&self.selector)
            .filter_map(|element| element.value().attr("href"))
            .filter(|href| is_followable(href))
            .map(|href| href.trim().to_string())
            .collect();

        Ok(links)
    }
}

/// Topic extractor driven by a CSS selector and the topic query parameter
#[derive(Debug)]
pub struct HtmlTopicExtractor {
    selector: Selector,
    topic_param: String,
}

impl HtmlTopicExtractor {
    /// Creates an extractor from a CSS selector matching topic anchors
    pub fn new(selector: &str, topic_param: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            selector: parse_selector(selector)?,
            topic_param: topic_param.into(),
        })
    }

    /// Creates an extractor from the forum configuration
    pub fn from_config(config: &ForumConfig) -> Result<Self, ConfigError> {
        Self::new(&config.topic_link_selector, config.topic_param.clone())
    }
}

impl TopicExtractor for HtmlTopicExtractor {
    fn extract_topics(&self, html: &str, page_url: &Url) -> Result<Vec<ListedTopic>, String> {
        let document = Html::parse_document(html);
        let mut topics = Vec::new();

        for element in document.select(&self.selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if !is_followable(href) {
                continue;
            }

            let url = match page_url.join(href.trim()) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Skipping unresolvable topic link {}: {}", href, e);
                    continue;
                }
            };

            let id = url
                .query_pairs()
                .find(|(k, _)| k == self.topic_param.as_str())
                .and_then(|(_, v)| v.parse::<u64>().ok());

            // Anchors without a topic id (e.g. "last post" jump links) are not topics
            let Some(id) = id else {
                continue;
            };

            let title = element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");

            topics.push(ListedTopic { id, title, url });
        }

        Ok(topics)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector(format!("{}: {:?}", selector, e)))
}

/// Returns false for hrefs that can never be a forum page
fn is_followable(href: &str) -> bool {
    let href = href.trim();
    !(href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC_PAGE: &str = r##"
        <html><body>
          <div class="pagination">
            <a href="#">Jump to page</a>
            <a href="./viewtopic.php?f=2&amp;t=10">1</a>
            <a href="./viewtopic.php?f=2&amp;t=10&amp;start=15">2</a>
            <a href="javascript:void(0)">...</a>
            <a href="./viewtopic.php?f=2&amp;t=10&amp;start=30">3</a>
          </div>
          <a href="./memberlist.php">Members</a>
        </body></html>
    "##;

    const LISTING_PAGE: &str = r#"
        <html><body>
          <ul class="topiclist">
            <li><a class="topictitle" href="./viewtopic.php?f=2&amp;t=101">  Welcome
                to the   forum </a>
                <a href="./viewtopic.php?f=2&amp;t=101&amp;view=unread">new</a></li>
            <li><a class="topictitle" href="./viewtopic.php?f=2&amp;t=102">Rules</a></li>
            <li><a class="topictitle" href="./viewforum.php?f=9">Moved: Sub-forum</a></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn test_pagination_links_in_document_order() {
        let parser = HtmlPaginationParser::new(".pagination a[href]").unwrap();
        let links = parser.pagination_links(TOPIC_PAGE).unwrap();

        assert_eq!(
            links,
            vec![
                "./viewtopic.php?f=2&t=10",
                "./viewtopic.php?f=2&t=10&start=15",
                "./viewtopic.php?f=2&t=10&start=30",
            ]
        );
    }

    #[test]
    fn test_pagination_without_matches() {
        let parser = HtmlPaginationParser::new(".pagination a[href]").unwrap();
        let links = parser
            .pagination_links("<html><body><p>single page</p></body></html>")
            .unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn test_invalid_selector_rejected() {
        assert!(matches!(
            HtmlPaginationParser::new(">>"),
            Err(ConfigError::InvalidSelector(_))
        ));
        assert!(matches!(
            HtmlTopicExtractor::new("a[]", "t"),
            Err(ConfigError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_extract_topics() {
        let extractor = HtmlTopicExtractor::new("a.topictitle[href]", "t").unwrap();
        let page_url = Url::parse("https://forum.example.com/viewforum.php?f=2").unwrap();
        let topics = extractor.extract_topics(LISTING_PAGE, &page_url).unwrap();

        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].id, 101);
        assert_eq!(topics[0].title, "Welcome to the forum");
        assert_eq!(
            topics[0].url.as_str(),
            "https://forum.example.com/viewtopic.php?f=2&t=101"
        );
        assert_eq!(topics[1].id, 102);
    }

    #[test]
    fn test_from_config_uses_defaults() {
        let config = ForumConfig::with_base_url("https://forum.example.com/");
        assert!(HtmlPaginationParser::from_config(&config).is_ok());
        assert!(HtmlTopicExtractor::from_config(&config).is_ok());
    }
}
