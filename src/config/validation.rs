use crate::config::types::{
    Config, CrawlerConfig, ForumConfig, JitConfig, OutputConfig, TestModeConfig, UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_forum_config(&config.forum)?;
    validate_jit_config(&config.jit)?;
    validate_output_config(&config.output)?;
    validate_test_mode(&config.test_mode)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.politeness_delay < 100 {
        return Err(ConfigError::Validation(format!(
            "politeness_delay must be >= 100ms, got {}ms",
            config.politeness_delay
        )));
    }

    if config.request_timeout < 1 || config.request_timeout > 300 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be between 1 and 300 seconds, got {}",
            config.request_timeout
        )));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint_interval must be >= 1, got {}",
            config.checkpoint_interval
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the forum URL scheme and markup selectors
fn validate_forum_config(config: &ForumConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            config.base_url
        )));
    }

    for (name, value) in [
        ("subforum_param", &config.subforum_param),
        ("topic_param", &config.topic_param),
        ("page_param", &config.page_param),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.subforum_param == config.topic_param
        || config.subforum_param == config.page_param
        || config.topic_param == config.page_param
    {
        return Err(ConfigError::Validation(
            "subforum_param, topic_param and page_param must be distinct".to_string(),
        ));
    }

    if config
        .session_params
        .iter()
        .any(|p| p == &config.subforum_param || p == &config.topic_param)
    {
        return Err(ConfigError::Validation(
            "session_params cannot strip the sub-forum or topic parameter".to_string(),
        ));
    }

    if config.posts_per_page == 0 {
        return Err(ConfigError::Validation(
            "posts_per_page must be at least 1".to_string(),
        ));
    }

    validate_selector(&config.pagination_selector)?;
    validate_selector(&config.topic_link_selector)?;

    if config.page_extension.is_empty()
        || !config
            .page_extension
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ConfigError::Validation(format!(
            "page_extension must be a non-empty alphanumeric extension, got '{}'",
            config.page_extension
        )));
    }

    Ok(())
}

/// Validates JIT refresh configuration
fn validate_jit_config(config: &JitConfig) -> Result<(), ConfigError> {
    if config.enabled && config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "jit max_pages must be >= 1 when enabled, got {}",
            config.max_pages
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.archive_root.is_empty() {
        return Err(ConfigError::Validation(
            "archive_root cannot be empty".to_string(),
        ));
    }

    if config.state_path.is_empty() {
        return Err(ConfigError::Validation(
            "state_path cannot be empty".to_string(),
        ));
    }

    if config.index_path.is_empty() {
        return Err(ConfigError::Validation(
            "index_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Rejects duplicate sub-forum ids in the test-mode filter
fn validate_test_mode(config: &TestModeConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for id in &config.sub_forums {
        if !seen.insert(id) {
            return Err(ConfigError::Validation(format!(
                "test-mode sub-forum {} is listed more than once",
                id
            )));
        }
    }
    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
