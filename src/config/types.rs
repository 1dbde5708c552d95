use serde::Deserialize;

/// Main configuration structure for Forum-Archiver
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub forum: ForumConfig,
    #[serde(default)]
    pub jit: JitConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "test-mode")]
    pub test_mode: TestModeConfig,
}

/// Crawler pacing and checkpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Mandatory pause before every outbound request (milliseconds)
    #[serde(rename = "politeness-delay")]
    pub politeness_delay: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,

    /// Number of archived pages between periodic checkpoints
    #[serde(rename = "checkpoint-interval")]
    pub checkpoint_interval: u32,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Describes the source forum's URL scheme and markup
#[derive(Debug, Clone, Deserialize)]
pub struct ForumConfig {
    /// Base URL that relative seed and listing URLs resolve against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Query parameter carrying the sub-forum id
    #[serde(rename = "subforum-param", default = "default_subforum_param")]
    pub subforum_param: String,

    /// Query parameter carrying the topic id
    #[serde(rename = "topic-param", default = "default_topic_param")]
    pub topic_param: String,

    /// Query parameter carrying the pagination offset
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,

    /// Posts shown per topic page; the pagination offset advances by this step
    #[serde(rename = "posts-per-page", default = "default_posts_per_page")]
    pub posts_per_page: u32,

    /// Query parameters stripped during canonicalization (session ids)
    #[serde(rename = "session-params", default = "default_session_params")]
    pub session_params: Vec<String>,

    /// CSS selector for pagination anchors on topic and listing pages
    #[serde(
        rename = "pagination-selector",
        default = "default_pagination_selector"
    )]
    pub pagination_selector: String,

    /// CSS selector for topic links on a sub-forum listing page
    #[serde(
        rename = "topic-link-selector",
        default = "default_topic_link_selector"
    )]
    pub topic_link_selector: String,

    /// File extension used for archived pages
    #[serde(rename = "page-extension", default = "default_page_extension")]
    pub page_extension: String,
}

impl ForumConfig {
    /// Builds a forum description with phpBB-style defaults for everything but the base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            subforum_param: default_subforum_param(),
            topic_param: default_topic_param(),
            page_param: default_page_param(),
            posts_per_page: default_posts_per_page(),
            session_params: default_session_params(),
            pagination_selector: default_pagination_selector(),
            topic_link_selector: default_topic_link_selector(),
            page_extension: default_page_extension(),
        }
    }
}

/// Just-in-time listing refresh configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JitConfig {
    /// Whether sub-forum listings are re-scanned for new topics
    #[serde(default)]
    pub enabled: bool,

    /// Maximum number of listing pages scanned per refresh
    #[serde(rename = "max-pages", default = "default_jit_max_pages")]
    pub max_pages: u32,

    /// Minimum time between two refreshes of the same sub-forum (seconds)
    #[serde(rename = "min-interval", default = "default_jit_min_interval")]
    pub min_interval: u64,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_pages: default_jit_max_pages(),
            min_interval: default_jit_min_interval(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for archived pages
    #[serde(rename = "archive-root")]
    pub archive_root: String,

    /// Path to the JSON progress checkpoint
    #[serde(rename = "state-path")]
    pub state_path: String,

    /// Path to the SQLite topic index
    #[serde(rename = "index-path")]
    pub index_path: String,
}

/// Restricts a run to an explicit, ordered list of sub-forums
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestModeConfig {
    #[serde(rename = "sub-forums", default)]
    pub sub_forums: Vec<u64>,
}

impl TestModeConfig {
    /// Returns true when no filter is configured
    pub fn is_disabled(&self) -> bool {
        self.sub_forums.is_empty()
    }
}

fn default_subforum_param() -> String {
    "f".to_string()
}

fn default_topic_param() -> String {
    "t".to_string()
}

fn default_page_param() -> String {
    "start".to_string()
}

fn default_posts_per_page() -> u32 {
    15
}

fn default_session_params() -> Vec<String> {
    vec!["sid".to_string()]
}

fn default_pagination_selector() -> String {
    ".pagination a[href]".to_string()
}

fn default_topic_link_selector() -> String {
    "a.topictitle[href]".to_string()
}

fn default_page_extension() -> String {
    "html".to_string()
}

fn default_jit_max_pages() -> u32 {
    1
}

fn default_jit_min_interval() -> u64 {
    3600
}
