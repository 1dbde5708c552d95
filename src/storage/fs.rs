//! Filesystem page store
//!
//! Pages land at `{archive_root}/{sub_forum_id}/{topic_id}/page_{n}.{ext}`.

use crate::index::{SubForumId, TopicId};
use crate::storage::{PageStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Checks that `root` exists (creating it if missing) and is writable
///
/// Run once at startup: an unusable archive root is fatal before any page
/// is fetched.
pub fn ensure_writable(root: &Path) -> StorageResult<()> {
    let unusable = |message: String| StorageError::ArchiveRoot {
        path: root.to_path_buf(),
        message,
    };

    if root.exists() {
        let meta = fs::metadata(root).map_err(|e| unusable(e.to_string()))?;
        if !meta.is_dir() {
            return Err(unusable("path is not a directory".to_string()));
        }
    } else {
        fs::create_dir_all(root).map_err(|e| unusable(e.to_string()))?;
    }

    // Writability probe, removed again on drop
    NamedTempFile::new_in(root).map_err(|e| unusable(e.to_string()))?;
    Ok(())
}

/// Writes pages below an archive root directory
#[derive(Debug, Clone)]
pub struct FsPageStore {
    root: PathBuf,
    extension: String,
}

impl FsPageStore {
    /// Creates a store rooted at `root` writing files with `extension`
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// The archive root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a page inside the archive
    pub fn page_path(&self, sub_forum_id: SubForumId, topic_id: TopicId, page_number: u32) -> PathBuf {
        self.root
            .join(sub_forum_id.to_string())
            .join(topic_id.to_string())
            .join(format!("page_{}.{}", page_number, self.extension))
    }
}

#[async_trait]
impl PageStore for FsPageStore {
    async fn save(
        &self,
        sub_forum_id: SubForumId,
        topic_id: TopicId,
        page_number: u32,
        body: &[u8],
    ) -> StorageResult<PathBuf> {
        if page_number == 0 {
            return Err(StorageError::InvalidPage(page_number));
        }

        let path = self.page_path(sub_forum_id, topic_id, page_number);

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| StorageError::Write {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&path, body)
            .await
            .map_err(|source| StorageError::Write {
                path: path.clone(),
                source,
            })?;

        tracing::debug!("Stored {} bytes at {}", body.len(), path.display());
        Ok(path)
    }
}
