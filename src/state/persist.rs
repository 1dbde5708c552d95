//! Atomic checkpoint file I/O
//!
//! The checkpoint is written to a temporary file in the same directory,
//! flushed to disk and renamed over the real file, so a reader sees either
//! the previous complete checkpoint or the new one and never a torn write.

use crate::state::ProgressState;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors raised while reading or writing the checkpoint file
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("checkpoint io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("checkpoint at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PersistError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Loads the checkpoint at `path`
///
/// A missing file yields an empty state (first run). A file that exists but
/// cannot be parsed is an error: silently starting over would re-download
/// the whole archive.
///
/// # Arguments
///
/// * `path` - Location of the checkpoint file
///
/// # Returns
///
/// * `Ok(ProgressState)` - The stored progress, or an empty one
/// * `Err(PersistError)` - The file could not be read or is corrupt
pub fn load_state(path: &Path) -> Result<ProgressState, PersistError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("No checkpoint at {}, starting empty", path.display());
            return Ok(ProgressState::new());
        }
        Err(e) => return Err(PersistError::io(path, e)),
    };

    serde_json::from_str(&content).map_err(|source| PersistError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the checkpoint to `path` atomically
///
/// Creates the parent directory if needed. The temporary file is removed
/// if any step fails.
pub fn save_state(state: &ProgressState, path: &Path) -> Result<(), PersistError> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;

    let json = serde_json::to_vec_pretty(state)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PersistError::io(dir, e))?;
    let tmp_path = tmp.path().to_path_buf();
    tmp.write_all(&json)
        .map_err(|e| PersistError::io(&tmp_path, e))?;
    tmp.flush().map_err(|e| PersistError::io(&tmp_path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PersistError::io(&tmp_path, e))?;

    tmp.persist(path)
        .map_err(|e| PersistError::io(path, e.error))?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Lists entries other than the checkpoint itself in its directory
    fn stray_files(path: &Path) -> Vec<PathBuf> {
        fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p != path)
            .collect()
    }

    fn sample_state() -> ProgressState {
        let mut state = ProgressState::new();
        state.mark_page_archived(1, 1);
        state.mark_page_archived(1, 2);
        state.mark_topic_archived(1, &[1, 2]).unwrap();
        state.mark_page_archived(2, 1);
        state.mark_sub_forum_completed(9, &[1]).unwrap();
        state.set_cursor(9, 2, 1);
        state
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = load_state(&dir.path().join("progress.json")).unwrap();
        assert_eq!(state, ProgressState::new());
    }

    #[test]
    fn test_save_then_load_preserves_progress() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        let state = sample_state();

        save_state(&state, &path).unwrap();
        let loaded = load_state(&path).unwrap();

        assert_eq!(loaded, state);
        assert!(stray_files(&path).is_empty());
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state").join("progress.json");

        save_state(&sample_state(), &path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            load_state(&path),
            Err(PersistError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_stale_staging_file_does_not_affect_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        let state = sample_state();
        save_state(&state, &path).unwrap();

        // Simulates a crash between writing the staging file and the rename
        fs::write(dir.path().join("progress.json.tmp"), "{ half written").unwrap();

        assert_eq!(load_state(&path).unwrap(), state);

        let mut next = state.clone();
        next.mark_page_archived(3, 1);
        save_state(&next, &path).unwrap();
        assert_eq!(load_state(&path).unwrap(), next);
    }

    #[test]
    fn test_unknown_fields_are_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(
            &path,
            r#"{"archivedTopics":{"5":{"archivedPageNumbers":[1,2]}},"futureField":true}"#,
        )
        .unwrap();

        let state = load_state(&path).unwrap();
        assert!(state.is_page_archived(5, 2));
        assert!(!state.is_topic_archived(5));
    }

    #[test]
    fn test_failed_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        // A directory where the checkpoint file should go makes the rename fail
        let path = dir.path().join("progress.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        assert!(matches!(
            save_state(&sample_state(), &path),
            Err(PersistError::Io { .. })
        ));
        assert!(stray_files(&path).is_empty());
    }
}
