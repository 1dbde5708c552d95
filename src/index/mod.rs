//! Topic index module
//!
//! The index is the pre-built crawl seed list: every sub-forum with its
//! listing URL, and every topic known to it with a seed URL. It is loaded
//! once at startup; topics found by JIT refresh are written back so later
//! runs start from a larger static list.

mod schema;
mod sqlite;

pub use sqlite::SqliteIndex;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sub-forum identifier
pub type SubForumId = u64;

/// Topic identifier
pub type TopicId = u64;

/// A top-level forum section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubForum {
    pub id: SubForumId,
    pub name: String,
    /// Live listing page; sub-forums without one are never JIT-refreshed
    pub listing_url: Option<String>,
    pub topics: Vec<Topic>,
}

impl SubForum {
    /// Merges newly discovered topics into the topic list
    ///
    /// Topics whose id is already known are ignored. The list stays sorted
    /// by topic id. Returns the number of topics actually added.
    pub fn merge_topics(&mut self, discovered: Vec<Topic>) -> usize {
        let before = self.topics.len();
        for topic in discovered {
            if !self.topics.iter().any(|t| t.id == topic.id) {
                self.topics.push(topic);
            }
        }
        self.topics.sort_by_key(|t| t.id);
        self.topics.len() - before
    }
}

/// A single discussion thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: TopicId,
    pub sub_forum_id: SubForumId,
    pub title: String,
    pub seed_url: String,
}

/// Errors raised while reading or extending the topic index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Topic index not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unknown sub-forum: {0}")]
    UnknownSubForum(SubForumId),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Source of the static crawl seed list
pub trait IndexSource: Send {
    /// Loads every sub-forum, without topics, ordered by id
    fn load_sub_forums(&self) -> IndexResult<Vec<SubForum>>;

    /// Loads the topics of one sub-forum, ordered by id
    fn load_topics(&self, sub_forum_id: SubForumId) -> IndexResult<Vec<Topic>>;

    /// Records topics discovered after the index was built
    ///
    /// Returns the number of topics that were not yet present.
    fn add_topics(&mut self, topics: &[Topic]) -> IndexResult<usize>;
}

/// Loads all sub-forums from the index at `path`
pub fn load_sub_forums(path: &Path) -> IndexResult<Vec<SubForum>> {
    SqliteIndex::open(path)?.load_sub_forums()
}

/// Loads the topics of one sub-forum from the index at `path`
pub fn load_topics(path: &Path, sub_forum_id: SubForumId) -> IndexResult<Vec<Topic>> {
    SqliteIndex::open(path)?.load_topics(sub_forum_id)
}
