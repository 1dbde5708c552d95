//! Storage traits and error types
//!
//! This module defines the trait interface for page stores and the
//! associated error type.

use crate::index::{SubForumId, TopicId};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while storing archived pages
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Archive root {path} is not usable: {message}")]
    ArchiveRoot { path: PathBuf, message: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid page number: {0}")]
    InvalidPage(u32),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for page store implementations
///
/// The control loop marks a page archived only after `save` returns `Ok`,
/// so an implementation must not report success before the bytes are
/// written.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Stores one page of a topic
    ///
    /// # Arguments
    ///
    /// * `sub_forum_id` - Sub-forum the topic belongs to
    /// * `topic_id` - Topic the page belongs to
    /// * `page_number` - 1-based page number
    /// * `body` - Page content
    ///
    /// # Returns
    ///
    /// The location the page was written to. Storing the same page again
    /// overwrites it.
    async fn save(
        &self,
        sub_forum_id: SubForumId,
        topic_id: TopicId,
        page_number: u32,
        body: &[u8],
    ) -> StorageResult<PathBuf>;
}
