//! State module for tracking archiving progress
//!
//! This module owns the durable checkpoint that lets an interrupted run
//! resume without losing or repeating work.
//!
//! # Components
//!
//! - `WorkState`: Lifecycle of a page, topic or sub-forum
//! - `ProgressState`: The persisted record of archived pages, topics and sub-forums
//! - `Checkpointer`: Lock-guarded shared access plus atomic saves

mod checkpoint;
mod persist;
mod progress;
mod work_state;

// Re-export main types
pub use checkpoint::Checkpointer;
pub use persist::{load_state, save_state, PersistError};
pub use progress::{ProgressState, ResumeCursor, TopicProgress};
pub use work_state::WorkState;
