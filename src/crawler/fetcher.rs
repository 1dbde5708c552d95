//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the archiver, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - Waiting the politeness delay before every request
//! - Classifying failures into [`FetchError`]
//!
//! The orchestrator, frontier discoverer and JIT refresher only see the
//! [`Fetcher`] trait, so tests substitute scripted fetchers.

use crate::config::{CrawlerConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Reasons a page could not be fetched
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// The URL the failed request was for
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. }
            | Self::Timeout { url }
            | Self::Network { url, .. }
            | Self::Body { url, .. } => url,
        }
    }
}

/// Retrieves the HTML body of an absolute URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns its body as text
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `request_timeout` - Overall timeout for one request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use forum_archiver::config::UserAgentConfig;
/// use forum_archiver::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "ForumArchiver".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    request_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(request_timeout)
        .connect_timeout(request_timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by a real HTTP client
///
/// Every request is preceded by the politeness delay, so consecutive calls
/// are spaced at least that far apart.
pub struct HttpFetcher {
    client: Client,
    politeness_delay: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher from the crawler and user agent settings
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, Duration::from_secs(crawler.request_timeout))?;

        Ok(Self {
            client,
            politeness_delay: Duration::from_millis(crawler.politeness_delay),
        })
    }

    /// Wraps an already built client
    pub fn with_client(client: Client, politeness_delay: Duration) -> Self {
        Self {
            client,
            politeness_delay,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if !self.politeness_delay.is_zero() {
            tokio::time::sleep(self.politeness_delay).await;
        }

        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Maps a transport failure onto a `FetchError`
fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestArchiver".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn fetcher(delay_ms: u64) -> HttpFetcher {
        let client = build_http_client(&create_test_config(), Duration::from_secs(5)).unwrap();
        HttpFetcher::with_client(client, Duration::from_millis(delay_ms))
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&create_test_config(), Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/viewtopic.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let body = fetcher(0)
            .fetch(&format!("{}/viewtopic.php?t=1", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = format!("{}/viewtopic.php?t=1", server.uri());
        let err = fetcher(0).fetch(&url).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Status {
                status: 503,
                url: url.clone()
            }
        );
        assert_eq!(err.url(), url);
    }

    #[tokio::test]
    async fn test_politeness_delay_spaces_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .mount(&server)
            .await;

        let fetcher = fetcher(50);
        let url = format!("{}/index.php", server.uri());
        let started = Instant::now();
        fetcher.fetch(&url).await.unwrap();
        fetcher.fetch(&url).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) is almost never listening locally
        let err = fetcher(0)
            .fetch("http://127.0.0.1:9/index.php")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Network { .. } | FetchError::Timeout { .. }
        ));
    }
}
