//! The persisted archiving checkpoint
//!
//! `ProgressState` is the single source of truth for what has been archived.
//! Fields are private; every mutation goes through an accessor that keeps
//! the checkpoint invariants:
//!
//! - a page number is recorded only after the page was downloaded and stored,
//! - a topic is fully archived only when every frontier page is recorded,
//! - a sub-forum is completed only when every known topic is fully archived.

use crate::index::{SubForumId, TopicId};
use crate::state::WorkState;
use crate::ArchiverError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Archiving progress of one topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    #[serde(default)]
    archived_page_numbers: BTreeSet<u32>,
    #[serde(default)]
    fully_archived: bool,
}

impl TopicProgress {
    /// Page numbers that have been downloaded and stored
    pub fn archived_page_numbers(&self) -> &BTreeSet<u32> {
        &self.archived_page_numbers
    }

    /// Whether every page of the topic has been archived
    pub fn is_fully_archived(&self) -> bool {
        self.fully_archived
    }
}

/// The last unit of work in flight when the process stopped
///
/// This is a hint for operators and logs; whether work is done is decided
/// exclusively by the archived sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeCursor {
    pub sub_forum_id: SubForumId,
    pub topic_id: TopicId,
    pub page_number: u32,
}

/// Persisted archiving checkpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    #[serde(default)]
    archived_topics: BTreeMap<TopicId, TopicProgress>,
    #[serde(default)]
    completed_sub_forums: BTreeSet<SubForumId>,
    #[serde(default)]
    jit_refresh_attempts: BTreeMap<SubForumId, DateTime<Utc>>,
    #[serde(default)]
    resume_cursor: Option<ResumeCursor>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl ProgressState {
    /// Creates an empty checkpoint (first run)
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Queries =====

    /// Returns true if the topic was fully archived by an earlier run
    pub fn is_topic_archived(&self, topic_id: TopicId) -> bool {
        self.archived_topics
            .get(&topic_id)
            .map(|t| t.fully_archived)
            .unwrap_or(false)
    }

    /// Returns true if the page was downloaded and stored by an earlier run
    pub fn is_page_archived(&self, topic_id: TopicId, page_number: u32) -> bool {
        self.archived_topics
            .get(&topic_id)
            .map(|t| t.archived_page_numbers.contains(&page_number))
            .unwrap_or(false)
    }

    /// Returns true if the sub-forum was completed by an earlier run
    pub fn is_sub_forum_completed(&self, sub_forum_id: SubForumId) -> bool {
        self.completed_sub_forums.contains(&sub_forum_id)
    }

    /// Progress of a single topic, if any page was ever archived
    pub fn topic(&self, topic_id: TopicId) -> Option<&TopicProgress> {
        self.archived_topics.get(&topic_id)
    }

    /// Lifecycle state of a topic derived from its archived pages
    pub fn topic_state(&self, topic_id: TopicId) -> WorkState {
        match self.archived_topics.get(&topic_id) {
            Some(t) if t.fully_archived => WorkState::Done,
            Some(t) if !t.archived_page_numbers.is_empty() => WorkState::InProgress,
            _ => WorkState::Pending,
        }
    }

    /// Lifecycle state of a sub-forum
    pub fn sub_forum_state(&self, sub_forum_id: SubForumId) -> WorkState {
        if self.is_sub_forum_completed(sub_forum_id) {
            WorkState::Done
        } else {
            WorkState::Pending
        }
    }

    /// Time of the last successful JIT refresh of a sub-forum
    pub fn last_jit_attempt(&self, sub_forum_id: SubForumId) -> Option<DateTime<Utc>> {
        self.jit_refresh_attempts.get(&sub_forum_id).copied()
    }

    /// The unit of work that was in flight at the last checkpoint
    pub fn resume_cursor(&self) -> Option<ResumeCursor> {
        self.resume_cursor
    }

    /// When the checkpoint was last written
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Iterates over every topic with recorded progress
    pub fn topics(&self) -> impl Iterator<Item = (TopicId, &TopicProgress)> {
        self.archived_topics.iter().map(|(id, t)| (*id, t))
    }

    /// Completed sub-forums in id order
    pub fn completed_sub_forums(&self) -> impl Iterator<Item = SubForumId> + '_ {
        self.completed_sub_forums.iter().copied()
    }

    /// Sub-forums with a recorded JIT refresh
    pub fn jit_refreshed_sub_forums(&self) -> impl Iterator<Item = SubForumId> + '_ {
        self.jit_refresh_attempts.keys().copied()
    }

    /// Total number of archived pages across all topics
    pub fn archived_page_count(&self) -> u64 {
        self.archived_topics
            .values()
            .map(|t| t.archived_page_numbers.len() as u64)
            .sum()
    }

    /// Number of fully archived topics
    pub fn fully_archived_topic_count(&self) -> u64 {
        self.archived_topics
            .values()
            .filter(|t| t.fully_archived)
            .count() as u64
    }

    // ===== Mutations =====

    /// Records a page as archived
    ///
    /// Call only after the page body was both downloaded and stored.
    pub fn mark_page_archived(&mut self, topic_id: TopicId, page_number: u32) {
        self.archived_topics
            .entry(topic_id)
            .or_default()
            .archived_page_numbers
            .insert(page_number);
    }

    /// Marks a topic fully archived
    ///
    /// `frontier_pages` are the page numbers the frontier produced for the
    /// topic in this run. The flag is set only if every one of them has been
    /// archived; otherwise the topic stays in progress and an
    /// `InvalidTransition` error names the first missing page.
    pub fn mark_topic_archived(
        &mut self,
        topic_id: TopicId,
        frontier_pages: &[u32],
    ) -> Result<(), ArchiverError> {
        let from = self.topic_state(topic_id);

        if let Some(missing) = frontier_pages
            .iter()
            .find(|page| !self.is_page_archived(topic_id, **page))
        {
            return Err(ArchiverError::InvalidTransition {
                unit: format!("topic {} (page {} not archived)", topic_id, missing),
                from,
                to: WorkState::Done,
            });
        }

        if frontier_pages.is_empty() {
            return Err(ArchiverError::InvalidTransition {
                unit: format!("topic {} (empty frontier)", topic_id),
                from,
                to: WorkState::Done,
            });
        }

        self.archived_topics.entry(topic_id).or_default().fully_archived = true;
        Ok(())
    }

    /// Marks a sub-forum completed
    ///
    /// `topic_ids` are all topics currently known to the sub-forum; each must
    /// be fully archived.
    pub fn mark_sub_forum_completed(
        &mut self,
        sub_forum_id: SubForumId,
        topic_ids: &[TopicId],
    ) -> Result<(), ArchiverError> {
        if let Some(pending) = topic_ids.iter().find(|t| !self.is_topic_archived(**t)) {
            return Err(ArchiverError::InvalidTransition {
                unit: format!("sub-forum {} (topic {} not archived)", sub_forum_id, pending),
                from: self.sub_forum_state(sub_forum_id),
                to: WorkState::Done,
            });
        }

        self.completed_sub_forums.insert(sub_forum_id);
        Ok(())
    }

    /// Records a successful JIT refresh of a sub-forum
    pub fn record_jit_attempt(&mut self, sub_forum_id: SubForumId, at: DateTime<Utc>) {
        self.jit_refresh_attempts.insert(sub_forum_id, at);
    }

    /// Moves the resume cursor to the unit of work about to start
    pub fn set_cursor(&mut self, sub_forum_id: SubForumId, topic_id: TopicId, page_number: u32) {
        self.resume_cursor = Some(ResumeCursor {
            sub_forum_id,
            topic_id,
            page_number,
        });
    }

    /// Clears the resume cursor after a complete run
    pub fn clear_cursor(&mut self) {
        self.resume_cursor = None;
    }

    /// Stamps the checkpoint with its write time
    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state() {
        let state = ProgressState::new();
        assert!(!state.is_topic_archived(1));
        assert!(!state.is_page_archived(1, 1));
        assert!(!state.is_sub_forum_completed(1));
        assert_eq!(state.topic_state(1), WorkState::Pending);
        assert_eq!(state.archived_page_count(), 0);
    }

    #[test]
    fn test_mark_page_moves_topic_in_progress() {
        let mut state = ProgressState::new();
        state.mark_page_archived(10, 1);

        assert!(state.is_page_archived(10, 1));
        assert!(!state.is_page_archived(10, 2));
        assert!(!state.is_topic_archived(10));
        assert_eq!(state.topic_state(10), WorkState::InProgress);
    }

    #[test]
    fn test_mark_topic_requires_every_frontier_page() {
        let mut state = ProgressState::new();
        state.mark_page_archived(10, 1);
        state.mark_page_archived(10, 3);

        let result = state.mark_topic_archived(10, &[1, 2, 3]);
        assert!(matches!(
            result,
            Err(ArchiverError::InvalidTransition { .. })
        ));
        assert!(!state.is_topic_archived(10));

        state.mark_page_archived(10, 2);
        state.mark_topic_archived(10, &[1, 2, 3]).unwrap();
        assert!(state.is_topic_archived(10));
        assert_eq!(state.topic_state(10), WorkState::Done);
    }

    #[test]
    fn test_mark_topic_rejects_empty_frontier() {
        let mut state = ProgressState::new();
        assert!(state.mark_topic_archived(10, &[]).is_err());
    }

    #[test]
    fn test_mark_sub_forum_requires_archived_topics() {
        let mut state = ProgressState::new();
        state.mark_page_archived(1, 1);
        state.mark_topic_archived(1, &[1]).unwrap();

        assert!(state.mark_sub_forum_completed(5, &[1, 2]).is_err());
        assert!(!state.is_sub_forum_completed(5));

        state.mark_page_archived(2, 1);
        state.mark_topic_archived(2, &[1]).unwrap();
        state.mark_sub_forum_completed(5, &[1, 2]).unwrap();
        assert!(state.is_sub_forum_completed(5));
        assert_eq!(state.sub_forum_state(5), WorkState::Done);
    }

    #[test]
    fn test_empty_sub_forum_can_complete() {
        let mut state = ProgressState::new();
        state.mark_sub_forum_completed(8, &[]).unwrap();
        assert!(state.is_sub_forum_completed(8));
    }

    #[test]
    fn test_jit_attempts_and_cursor() {
        let mut state = ProgressState::new();
        let now = Utc::now();

        state.record_jit_attempt(3, now);
        state.set_cursor(3, 44, 2);

        assert_eq!(state.last_jit_attempt(3), Some(now));
        assert_eq!(state.last_jit_attempt(4), None);
        assert_eq!(
            state.resume_cursor(),
            Some(ResumeCursor {
                sub_forum_id: 3,
                topic_id: 44,
                page_number: 2
            })
        );

        state.clear_cursor();
        assert_eq!(state.resume_cursor(), None);
    }

    #[test]
    fn test_counters() {
        let mut state = ProgressState::new();
        state.mark_page_archived(1, 1);
        state.mark_page_archived(1, 2);
        state.mark_page_archived(2, 1);
        state.mark_topic_archived(1, &[1, 2]).unwrap();

        assert_eq!(state.archived_page_count(), 3);
        assert_eq!(state.fully_archived_topic_count(), 1);
    }

    #[test]
    fn test_json_shape_uses_camel_case() {
        let mut state = ProgressState::new();
        state.mark_page_archived(7, 1);
        state.mark_topic_archived(7, &[1]).unwrap();
        state.mark_sub_forum_completed(2, &[7]).unwrap();

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["archivedTopics"]["7"]["archivedPageNumbers"][0], 1);
        assert_eq!(json["archivedTopics"]["7"]["fullyArchived"], true);
        assert_eq!(json["completedSubForums"][0], 2);
        assert!(json["resumeCursor"].is_null());
    }
}
