//! Shared, lock-guarded access to the checkpoint
//!
//! The orchestrator mutates progress while the shutdown listener may save it
//! concurrently. Both go through one `Checkpointer`, whose mutex is held for
//! the whole of every mutation and every save, so a save never observes a
//! half-applied update.

use crate::state::persist::{load_state, save_state, PersistError};
use crate::state::ProgressState;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Owns the in-memory checkpoint and the file it persists to
#[derive(Debug)]
pub struct Checkpointer {
    path: PathBuf,
    state: Mutex<ProgressState>,
}

impl Checkpointer {
    /// Loads the checkpoint at `path`, or starts empty if there is none
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let state = load_state(&path)?;

        tracing::info!(
            "Loaded checkpoint from {} ({} pages, {} topics archived)",
            path.display(),
            state.archived_page_count(),
            state.fully_archived_topic_count()
        );

        Ok(Self::with_state(path, state))
    }

    /// Starts from an empty checkpoint, ignoring any file at `path`
    ///
    /// The file is only replaced on the first save.
    pub fn fresh(path: impl Into<PathBuf>) -> Self {
        Self::with_state(path.into(), ProgressState::new())
    }

    /// Wraps an existing state
    pub fn with_state(path: PathBuf, state: ProgressState) -> Self {
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Location of the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs a read-only query against the current state
    pub fn read<R>(&self, f: impl FnOnce(&ProgressState) -> R) -> R {
        f(&self.lock())
    }

    /// Applies a mutation to the current state
    ///
    /// The change is in memory only until the next [`save`](Self::save).
    pub fn update<R>(&self, f: impl FnOnce(&mut ProgressState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Returns a copy of the current state
    pub fn snapshot(&self) -> ProgressState {
        self.lock().clone()
    }

    /// Persists the current state atomically
    pub fn save(&self) -> Result<(), PersistError> {
        let mut state = self.lock();
        state.touch(Utc::now());
        save_state(&state, &self.path)?;

        tracing::debug!("Checkpoint saved to {}", self.path.display());
        Ok(())
    }

    // Accessors never leave the state half-updated, so a poisoned lock still
    // guards a consistent value.
    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
