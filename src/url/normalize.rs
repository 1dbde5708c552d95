use crate::UrlError;
use url::Url;

/// Query-string rules applied while canonicalizing a forum URL
#[derive(Debug, Clone, Copy)]
pub struct QueryRules<'a> {
    /// Pagination offset parameter; dropped when it equals `0`
    pub page_param: &'a str,

    /// Session parameters that never identify content
    pub session_params: &'a [String],

    /// Sub-forum parameter and value to attach when the link omits it
    pub sub_forum: Option<(&'a str, u64)>,
}

/// Canonicalizes an absolute forum URL
///
/// # Canonicalization Steps
///
/// 1. Reject non-HTTP(S) schemes and host-less URLs
/// 2. Lowercase the host
/// 3. Normalize path:
///    - Remove dot segments (. and ..) and repeated slashes
///    - Remove trailing slash (except for root /)
/// 4. Remove fragment (everything after #)
/// 5. Remove session and tracking query parameters
/// 6. Remove a zero pagination offset (`start=0` is page one)
/// 7. Attach the sub-forum parameter when missing
/// 8. Sort query parameters by key
/// 9. Remove empty query string (trailing ?)
///
/// # Examples
///
/// ```
/// use forum_archiver::url::{canonicalize_url, QueryRules};
/// use url::Url;
///
/// let sessions = vec!["sid".to_string()];
/// let rules = QueryRules { page_param: "start", session_params: &sessions, sub_forum: Some(("f", 4)) };
/// let url = Url::parse("https://Forum.Example.com/viewtopic.php?t=9&sid=abc&start=0#p1").unwrap();
/// let canonical = canonicalize_url(url, &rules).unwrap();
/// assert_eq!(canonical.as_str(), "https://forum.example.com/viewtopic.php?f=4&t=9");
/// ```
pub fn canonicalize_url(mut url: Url, rules: &QueryRules<'_>) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    let params = canonical_query_params(&url, rules);
    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            // Skip empty segments (from multiple slashes) and current directory markers
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters, completes and sorts the query parameters of a URL
fn canonical_query_params(url: &Url, rules: &QueryRules<'_>) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, value)| {
            !is_session_param(key, rules.session_params)
                && !(key == rules.page_param && value == "0")
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if let Some((name, id)) = rules.sub_forum {
        if !params.iter().any(|(k, _)| k == name) {
            params.push((name.to_string(), id.to_string()));
        }
    }

    // Stable sort keeps repeated keys in their original order
    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter carries session or tracking state
fn is_session_param(key: &str, session_params: &[String]) -> bool {
    session_params.iter().any(|p| p == key) || key.starts_with("utm_")
}
