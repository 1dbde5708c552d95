//! Statistics generation from a checkpoint
//!
//! This module provides functionality for summarizing archiving progress
//! from a state file, optionally set against the topic index.

use crate::index::IndexSource;
use crate::state::{ProgressState, ResumeCursor, WorkState};
use crate::ArchiverError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Archive progress summary
#[derive(Debug, Clone, Default)]
pub struct ArchiveStatistics {
    /// Pages downloaded and stored
    pub archived_pages: u64,

    /// Count of topics with recorded progress, by state
    pub topics_by_state: HashMap<WorkState, u64>,

    /// Sub-forums completed
    pub completed_sub_forums: u64,

    /// Sub-forums with at least one successful JIT refresh
    pub refreshed_sub_forums: u64,

    /// Sub-forums listed in the index, if it was consulted
    pub indexed_sub_forums: Option<u64>,

    /// Topics listed in the index, if it was consulted
    pub indexed_topics: Option<u64>,

    /// Last unit of work in flight
    pub resume_cursor: Option<ResumeCursor>,

    /// When the checkpoint was last written
    pub updated_at: Option<DateTime<Utc>>,
}

impl ArchiveStatistics {
    /// Summarizes a checkpoint on its own
    pub fn from_state(state: &ProgressState) -> Self {
        let mut topics_by_state = HashMap::new();
        for (topic_id, _) in state.topics() {
            *topics_by_state.entry(state.topic_state(topic_id)).or_insert(0) += 1;
        }

        Self {
            archived_pages: state.archived_page_count(),
            topics_by_state,
            completed_sub_forums: state.completed_sub_forums().count() as u64,
            refreshed_sub_forums: state.jit_refreshed_sub_forums().count() as u64,
            indexed_sub_forums: None,
            indexed_topics: None,
            resume_cursor: state.resume_cursor(),
            updated_at: state.updated_at(),
        }
    }

    /// Number of topics in the given state
    pub fn topics_in(&self, state: WorkState) -> u64 {
        self.topics_by_state.get(&state).copied().unwrap_or(0)
    }
}

/// Loads statistics from a checkpoint and the topic index
///
/// # Arguments
///
/// * `state` - The loaded checkpoint
/// * `index` - The topic index the archive is built from
///
/// # Returns
///
/// * `Ok(ArchiveStatistics)` - Successfully computed statistics
/// * `Err(ArchiverError)` - Failed to query the index
pub fn load_statistics(
    state: &ProgressState,
    index: &dyn IndexSource,
) -> Result<ArchiveStatistics, ArchiverError> {
    let mut stats = ArchiveStatistics::from_state(state);

    let sub_forums = index.load_sub_forums()?;
    let mut indexed_topics = 0u64;
    for sub_forum in &sub_forums {
        indexed_topics += index.load_topics(sub_forum.id)?.len() as u64;
    }

    stats.indexed_sub_forums = Some(sub_forums.len() as u64);
    stats.indexed_topics = Some(indexed_topics);

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &ArchiveStatistics) {
    println!("=== Archive Statistics ===\n");

    println!("Overview:");
    println!("  Pages archived: {}", stats.archived_pages);
    match stats.indexed_sub_forums {
        Some(total) => println!(
            "  Sub-forums completed: {} / {}",
            stats.completed_sub_forums, total
        ),
        None => println!("  Sub-forums completed: {}", stats.completed_sub_forums),
    }
    println!("  Sub-forums JIT-refreshed: {}", stats.refreshed_sub_forums);
    println!();

    println!("Topics by State:");
    let done = stats.topics_in(WorkState::Done);
    let in_progress = stats.topics_in(WorkState::InProgress);
    println!("  {}: {}", WorkState::Done, done);
    println!("  {}: {}", WorkState::InProgress, in_progress);
    if let Some(total) = stats.indexed_topics {
        let pending = total.saturating_sub(done + in_progress);
        println!("  {}: {}", WorkState::Pending, pending);

        let percentage = if total > 0 {
            (done as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!();
        println!(
            "Completion: {:.1}% ({} / {} topics fully archived)",
            percentage, done, total
        );
    }
    println!();

    if let Some(cursor) = stats.resume_cursor {
        println!(
            "Last position: sub-forum {}, topic {}, page {}",
            cursor.sub_forum_id, cursor.topic_id, cursor.page_number
        );
    }

    match stats.updated_at {
        Some(at) => println!("Checkpoint written: {}", at.to_rfc3339()),
        None => println!("Checkpoint written: never"),
    }
}
