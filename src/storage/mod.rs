//! Storage module for persisting archived pages
//!
//! This module handles writing downloaded topic pages to the archive:
//! - The `PageStore` trait the control loop stores pages through
//! - A filesystem implementation laid out by sub-forum and topic
//! - A startup check that the archive root is writable

mod fs;
mod traits;

pub use fs::{ensure_writable, FsPageStore};
pub use traits::{PageStore, StorageError, StorageResult};
