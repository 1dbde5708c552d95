//! Integration tests for the archiver
//!
//! These tests use wiremock to serve a small forum and run `crawl` end to
//! end against a real SQLite index, page store and checkpoint file.

use forum_archiver::config::{
    Config, CrawlerConfig, ForumConfig, JitConfig, OutputConfig, TestModeConfig, UserAgentConfig,
};
use forum_archiver::crawler::{crawl, RunOutcome};
use forum_archiver::index::{IndexError, IndexSource, SqliteIndex, Topic};
use forum_archiver::state::{load_state, PersistError};
use forum_archiver::ArchiverError;
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Serves pages keyed by `path?query`
struct ForumSite {
    pages: HashMap<String, String>,
}

impl Respond for ForumSite {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let key = match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        };

        match self.pages.get(&key) {
            Some(body) => ResponseTemplate::new(200)
                .set_body_string(body.clone())
                .insert_header("content-type", "text/html; charset=utf-8"),
            None => ResponseTemplate::new(404),
        }
    }
}

fn topic_page(topic: u64, page: u64, pages: u64) -> String {
    let nav: String = (0..pages)
        .map(|p| {
            format!(
                r#"<a href="./viewtopic.php?f=1&amp;t={}&amp;start={}">{}</a>"#,
                topic,
                p * 20,
                p + 1
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="post">topic {} page {}</div><div class="pagination">{}</div></body></html>"#,
        topic, page, nav
    )
}

/// Sub-forum 1 lists topics 1 (two pages) and 2 (one page)
fn forum_site() -> ForumSite {
    let listing = r#"<html><body><ul class="topiclist">
        <li><a class="topictitle" href="./viewtopic.php?f=1&amp;t=1">Indexed topic</a></li>
        <li><a class="topictitle" href="./viewtopic.php?f=1&amp;t=2">Brand new topic</a></li>
    </ul></body></html>"#;

    let pages = [
        ("/viewforum.php?f=1", listing.to_string()),
        ("/viewtopic.php?f=1&t=1", topic_page(1, 1, 2)),
        ("/viewtopic.php?f=1&start=20&t=1", topic_page(1, 2, 2)),
        ("/viewtopic.php?f=1&t=2", topic_page(2, 1, 1)),
    ];

    ForumSite {
        pages: pages
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    }
}

/// Creates a test configuration rooted in `dir` for the forum at `base_url`
fn create_test_config(dir: &Path, base_url: &str, jit_enabled: bool) -> Config {
    // The test forum shows 20 posts per page
    let mut forum = ForumConfig::with_base_url(format!("{}/", base_url));
    forum.posts_per_page = 20;

    Config {
        crawler: CrawlerConfig {
            politeness_delay: 0,
            request_timeout: 5,
            checkpoint_interval: 2,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestArchiver".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        forum,
        jit: JitConfig {
            enabled: jit_enabled,
            max_pages: 1,
            min_interval: 3600,
        },
        output: OutputConfig {
            archive_root: dir.join("archive").display().to_string(),
            state_path: dir.join("state").join("progress.json").display().to_string(),
            index_path: dir.join("index.db").display().to_string(),
        },
        test_mode: TestModeConfig::default(),
    }
}

/// Writes an index with sub-forum 1 holding only topic 1
fn build_index(path: &Path) {
    let mut index = SqliteIndex::create(path).unwrap();
    index
        .insert_sub_forum(1, "General", Some("viewforum.php?f=1"))
        .unwrap();
    index
        .add_topics(&[Topic {
            id: 1,
            sub_forum_id: 1,
            title: "Indexed topic".to_string(),
            seed_url: "viewtopic.php?t=1".to_string(),
        }])
        .unwrap();
}

async fn start_forum() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(forum_site())
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_full_archive_with_jit_refresh() {
    let server = start_forum().await;
    let dir = TempDir::new().unwrap();
    build_index(&dir.path().join("index.db"));

    let config = create_test_config(dir.path(), &server.uri(), true);
    let summary = crawl(config, false).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.metrics.pages_archived, 3);
    assert_eq!(summary.metrics.topics_archived, 2);

    let archive = dir.path().join("archive").join("1");
    let page = std::fs::read_to_string(archive.join("1").join("page_2.html")).unwrap();
    assert!(page.contains("topic 1 page 2"));
    assert!(archive.join("1").join("page_1.html").is_file());
    assert!(archive.join("2").join("page_1.html").is_file());

    let state = load_state(&dir.path().join("state").join("progress.json")).unwrap();
    assert!(state.is_topic_archived(1));
    assert!(state.is_topic_archived(2));
    assert!(state.is_sub_forum_completed(1));
    assert!(state.last_jit_attempt(1).is_some());

    // The refreshed topic is now part of the index
    let index = SqliteIndex::open(&dir.path().join("index.db")).unwrap();
    let ids: Vec<_> = index.load_topics(1).unwrap().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_second_run_downloads_nothing() {
    let server = start_forum().await;
    let dir = TempDir::new().unwrap();
    build_index(&dir.path().join("index.db"));

    crawl(create_test_config(dir.path(), &server.uri(), false), false)
        .await
        .unwrap();
    let requests_after_first = server.received_requests().await.unwrap().len();

    let summary = crawl(create_test_config(dir.path(), &server.uri(), false), false)
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.metrics.pages_archived, 0);
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        requests_after_first
    );
}

#[tokio::test]
async fn test_jit_disabled_uses_index_only() {
    let server = start_forum().await;
    let dir = TempDir::new().unwrap();
    build_index(&dir.path().join("index.db"));

    let summary = crawl(create_test_config(dir.path(), &server.uri(), false), false)
        .await
        .unwrap();

    assert_eq!(summary.metrics.pages_archived, 2);
    assert!(!dir.path().join("archive").join("1").join("2").exists());
}

#[tokio::test]
async fn test_failed_jit_refresh_is_degraded() {
    // A server that only knows the topic pages, not the listing
    let server = MockServer::start().await;
    let mut site = forum_site();
    site.pages.remove("/viewforum.php?f=1");
    Mock::given(method("GET"))
        .respond_with(site)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    build_index(&dir.path().join("index.db"));

    let summary = crawl(create_test_config(dir.path(), &server.uri(), true), false)
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.metrics.pages_archived, 2);

    let state = load_state(&dir.path().join("state").join("progress.json")).unwrap();
    assert!(state.is_sub_forum_completed(1));
    assert_eq!(state.last_jit_attempt(1), None);
}

#[tokio::test]
async fn test_missing_index_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), "http://127.0.0.1:9", false);

    let result = crawl(config, false).await;
    assert!(matches!(
        result,
        Err(ArchiverError::Index(IndexError::Missing(_)))
    ));
}

#[tokio::test]
async fn test_corrupt_checkpoint_is_fatal() {
    let dir = TempDir::new().unwrap();
    build_index(&dir.path().join("index.db"));
    std::fs::create_dir_all(dir.path().join("state")).unwrap();
    std::fs::write(dir.path().join("state").join("progress.json"), "not json").unwrap();

    let config = create_test_config(dir.path(), "http://127.0.0.1:9", false);
    let result = crawl(config, false).await;

    assert!(matches!(
        result,
        Err(ArchiverError::Persist(PersistError::Corrupt { .. }))
    ));
}

#[tokio::test]
async fn test_fresh_ignores_corrupt_checkpoint() {
    let server = start_forum().await;
    let dir = TempDir::new().unwrap();
    build_index(&dir.path().join("index.db"));
    std::fs::create_dir_all(dir.path().join("state")).unwrap();
    std::fs::write(dir.path().join("state").join("progress.json"), "not json").unwrap();

    let summary = crawl(create_test_config(dir.path(), &server.uri(), false), true)
        .await
        .unwrap();

    assert_eq!(summary.metrics.pages_archived, 2);
    let state = load_state(&dir.path().join("state").join("progress.json")).unwrap();
    assert!(state.is_topic_archived(1));
}
