//! Archive coordinator - main control loop
//!
//! This module contains the loop that walks sub-forums, topics and pages,
//! including:
//! - Loading the seed list from the topic index
//! - JIT-refreshing sub-forum listings before they are archived
//! - Discovering each topic's page frontier
//! - Downloading and storing pages not archived yet
//! - Checkpointing progress and honoring stop requests

use crate::config::Config;
use crate::crawler::frontier::{Frontier, FrontierDiscoverer};
use crate::crawler::jit::{should_refresh, JitRefresher};
use crate::crawler::shutdown::StopSignal;
use crate::crawler::{Fetcher, HtmlPaginationParser, HtmlTopicExtractor};
use crate::index::{IndexSource, SubForum, SubForumId, Topic, TopicId};
use crate::output::{MetricsSink, MetricsSnapshot, PageEvent, TopicOutcome};
use crate::state::Checkpointer;
use crate::storage::PageStore;
use crate::url::UrlCanonicalizer;
use crate::ArchiverError;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

/// External collaborators the control loop drives
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub store: Arc<dyn PageStore>,
    pub index: Box<dyn IndexSource>,
    pub metrics: Box<dyn MetricsSink>,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every selected sub-forum was processed
    Completed,

    /// A stop was requested; progress was checkpointed
    Cancelled,
}

/// Result of one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub metrics: MetricsSnapshot,
}

/// Whether the loop should keep going after a unit of work
enum Flow {
    Continue,
    Stop,
}

/// Main archive coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    checkpointer: Arc<Checkpointer>,
    sub_forums: Vec<SubForum>,
    discoverer: FrontierDiscoverer,
    refresher: JitRefresher,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn PageStore>,
    index: Box<dyn IndexSource>,
    metrics: Box<dyn MetricsSink>,
    stop: StopSignal,
    pages_since_checkpoint: u32,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Loads the sub-forums and their topics from the index. In test mode
    /// only the listed sub-forums are kept, in the listed order; otherwise
    /// all sub-forums are processed in id order.
    ///
    /// # Arguments
    ///
    /// * `config` - The archiver configuration
    /// * `checkpointer` - The loaded checkpoint, shared with the shutdown listener
    /// * `collaborators` - Fetcher, page store, index and metrics sink
    /// * `stop` - Stop signal polled at the loop's safe points
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(ArchiverError)` - The index could not be read or the forum
    ///   settings are unusable
    pub fn new(
        config: Config,
        checkpointer: Arc<Checkpointer>,
        collaborators: Collaborators,
        stop: StopSignal,
    ) -> Result<Self, ArchiverError> {
        let Collaborators {
            fetcher,
            store,
            index,
            metrics,
        } = collaborators;

        let urls = Arc::new(UrlCanonicalizer::new(&config.forum)?);
        let parser = Arc::new(HtmlPaginationParser::from_config(&config.forum)?);
        let extractor = Arc::new(HtmlTopicExtractor::from_config(&config.forum)?);

        let sub_forums = load_seed_list(index.as_ref(), &config.test_mode.sub_forums)?;
        tracing::info!(
            "Loaded {} sub-forum(s) with {} topic(s) from the index",
            sub_forums.len(),
            sub_forums.iter().map(|s| s.topics.len()).sum::<usize>()
        );

        let discoverer =
            FrontierDiscoverer::new(Arc::clone(&fetcher), parser.clone(), Arc::clone(&urls));
        let refresher = JitRefresher::new(Arc::clone(&fetcher), parser, extractor, urls);

        Ok(Self {
            config: Arc::new(config),
            checkpointer,
            sub_forums,
            discoverer,
            refresher,
            fetcher,
            store,
            index,
            metrics,
            stop,
            pages_since_checkpoint: 0,
        })
    }

    /// Sub-forums this run will walk, in processing order
    pub fn sub_forums(&self) -> &[SubForum] {
        &self.sub_forums
    }

    /// Runs the archive loop to completion or until a stop is requested
    ///
    /// Page, topic and discovery failures are logged, counted and skipped.
    /// Only a failure to persist the checkpoint aborts the run.
    pub async fn run(mut self) -> Result<RunSummary, ArchiverError> {
        let sub_forums = std::mem::take(&mut self.sub_forums);

        let pending = self.checkpointer.read(|state| {
            sub_forums
                .iter()
                .filter(|s| !state.is_sub_forum_completed(s.id))
                .flat_map(|s| s.topics.iter())
                .filter(|t| !state.is_topic_archived(t.id))
                .count() as u64
        });
        self.metrics.begin(pending);

        for mut sub_forum in sub_forums {
            if self.stop.is_stop_requested() {
                return self.finish_cancelled();
            }

            if self
                .checkpointer
                .read(|s| s.is_sub_forum_completed(sub_forum.id))
            {
                tracing::debug!("Sub-forum {} already completed, skipping", sub_forum.id);
                continue;
            }

            tracing::info!(
                "Archiving sub-forum {} ({}), {} topic(s) indexed",
                sub_forum.id,
                sub_forum.name,
                sub_forum.topics.len()
            );

            self.maybe_refresh(&mut sub_forum).await;

            if let Flow::Stop = self.archive_sub_forum(&sub_forum).await? {
                return self.finish_cancelled();
            }

            let topic_ids: Vec<TopicId> = sub_forum.topics.iter().map(|t| t.id).collect();
            let completed = self
                .checkpointer
                .update(|s| s.mark_sub_forum_completed(sub_forum.id, &topic_ids));
            match completed {
                Ok(()) => tracing::info!("Sub-forum {} completed", sub_forum.id),
                Err(e) => tracing::info!("Sub-forum {} not complete yet: {}", sub_forum.id, e),
            }

            self.checkpoint()?;
        }

        self.checkpointer.update(|s| s.clear_cursor());
        self.checkpoint()?;
        self.metrics.flush();

        Ok(RunSummary {
            outcome: RunOutcome::Completed,
            metrics: self.metrics.snapshot(),
        })
    }

    /// Re-scans a sub-forum's live listing and merges new topics
    ///
    /// Failures leave the indexed topic list in place.
    async fn maybe_refresh(&mut self, sub_forum: &mut SubForum) {
        let jit = self.config.jit.clone();
        let now = Utc::now();
        let last_attempt = self.checkpointer.read(|s| s.last_jit_attempt(sub_forum.id));
        let min_interval = chrono::Duration::seconds(jit.min_interval as i64);

        if !should_refresh(jit.enabled, sub_forum, last_attempt, min_interval, now) {
            return;
        }

        let known: HashSet<TopicId> = sub_forum.topics.iter().map(|t| t.id).collect();
        let new_topics = match self
            .refresher
            .refresh(sub_forum, &known, jit.max_pages)
            .await
        {
            Ok(topics) => topics,
            Err(e) => {
                tracing::warn!(
                    "JIT refresh of sub-forum {} failed, using indexed topics: {}",
                    sub_forum.id,
                    e
                );
                return;
            }
        };

        if !new_topics.is_empty() {
            if let Err(e) = self.index.add_topics(&new_topics) {
                tracing::warn!(
                    "Could not record {} new topic(s) in the index: {}",
                    new_topics.len(),
                    e
                );
            }

            let added = sub_forum.merge_topics(new_topics);
            self.metrics.add_pending_topics(added as u64);
        }

        self.checkpointer
            .update(|s| s.record_jit_attempt(sub_forum.id, now));
    }

    async fn archive_sub_forum(&mut self, sub_forum: &SubForum) -> Result<Flow, ArchiverError> {
        for topic in &sub_forum.topics {
            if self.stop.is_stop_requested() {
                return Ok(Flow::Stop);
            }

            if self.checkpointer.read(|s| s.is_topic_archived(topic.id)) {
                tracing::debug!("Topic {} already archived, skipping", topic.id);
                continue;
            }

            if let Flow::Stop = self.archive_topic(sub_forum.id, topic).await? {
                return Ok(Flow::Stop);
            }
        }

        Ok(Flow::Continue)
    }

    async fn archive_topic(
        &mut self,
        sub_forum_id: SubForumId,
        topic: &Topic,
    ) -> Result<Flow, ArchiverError> {
        let mut frontier = match self.discoverer.discover(&topic.seed_url, sub_forum_id).await {
            Ok(frontier) => frontier,
            Err(e) => {
                tracing::warn!("Skipping topic {} ({}): {}", topic.id, topic.title, e);
                self.metrics.record_topic(TopicOutcome::DiscoveryFailed);
                return Ok(Flow::Continue);
            }
        };

        tracing::debug!(
            "Topic {} ({}) has {} page(s)",
            topic.id,
            topic.title,
            frontier.len()
        );

        let mut all_succeeded = frontier.is_complete();
        if !all_succeeded {
            tracing::warn!(
                "Frontier of topic {} is incomplete; topic stays unarchived this run",
                topic.id
            );
        }

        let pages = frontier.pages().to_vec();
        for page in pages {
            if self.stop.is_stop_requested() {
                return Ok(Flow::Stop);
            }

            if self
                .checkpointer
                .read(|s| s.is_page_archived(topic.id, page.number))
            {
                self.metrics.record_page(PageEvent::Skipped {
                    topic_id: topic.id,
                    page_number: page.number,
                });
                continue;
            }

            self.checkpointer
                .update(|s| s.set_cursor(sub_forum_id, topic.id, page.number));

            if !self
                .archive_page(sub_forum_id, topic.id, page.number, &page.url, &mut frontier)
                .await?
            {
                all_succeeded = false;
            }
        }

        let outcome = if all_succeeded {
            let page_numbers = frontier.page_numbers();
            match self
                .checkpointer
                .update(|s| s.mark_topic_archived(topic.id, &page_numbers))
            {
                Ok(()) => {
                    tracing::info!(
                        "Topic {} archived ({} page(s))",
                        topic.id,
                        page_numbers.len()
                    );
                    TopicOutcome::Archived
                }
                Err(e) => {
                    tracing::warn!("Topic {} not marked archived: {}", topic.id, e);
                    TopicOutcome::Incomplete
                }
            }
        } else {
            TopicOutcome::Incomplete
        };
        self.metrics.record_topic(outcome);

        self.checkpoint()?;
        Ok(Flow::Continue)
    }

    /// Downloads (or reuses the discovery body of) one page and stores it
    ///
    /// Returns whether the page is now archived.
    async fn archive_page(
        &mut self,
        sub_forum_id: SubForumId,
        topic_id: TopicId,
        page_number: u32,
        url: &url::Url,
        frontier: &mut Frontier,
    ) -> Result<bool, ArchiverError> {
        let body = match frontier.take_body(url) {
            Some(body) => body,
            None => match self.fetcher.fetch(url.as_str()).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(
                        "Failed to fetch page {} of topic {}: {}",
                        page_number,
                        topic_id,
                        e
                    );
                    self.metrics.record_page(PageEvent::FetchFailed {
                        topic_id,
                        page_number,
                    });
                    return Ok(false);
                }
            },
        };

        match self
            .store
            .save(sub_forum_id, topic_id, page_number, body.as_bytes())
            .await
        {
            Ok(path) => {
                tracing::debug!(
                    "Page {} of topic {} stored at {}",
                    page_number,
                    topic_id,
                    path.display()
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to store page {} of topic {}: {}",
                    page_number,
                    topic_id,
                    e
                );
                self.metrics.record_page(PageEvent::StoreFailed {
                    topic_id,
                    page_number,
                });
                return Ok(false);
            }
        }

        self.checkpointer
            .update(|s| s.mark_page_archived(topic_id, page_number));
        self.metrics.record_page(PageEvent::Archived {
            topic_id,
            page_number,
            bytes: body.len(),
        });

        self.pages_since_checkpoint += 1;
        if self.pages_since_checkpoint >= self.config.crawler.checkpoint_interval {
            self.checkpoint()?;
        }

        Ok(true)
    }

    fn checkpoint(&mut self) -> Result<(), ArchiverError> {
        self.checkpointer.save()?;
        self.pages_since_checkpoint = 0;
        Ok(())
    }

    fn finish_cancelled(mut self) -> Result<RunSummary, ArchiverError> {
        tracing::info!("Stop requested, checkpointing and exiting");
        self.checkpoint()?;
        self.metrics.flush();

        Ok(RunSummary {
            outcome: RunOutcome::Cancelled,
            metrics: self.metrics.snapshot(),
        })
    }
}

/// Loads sub-forums with their topics, applying the test-mode filter
fn load_seed_list(
    index: &dyn IndexSource,
    filter: &[SubForumId],
) -> Result<Vec<SubForum>, ArchiverError> {
    let mut all = index.load_sub_forums()?;

    let mut selected = if filter.is_empty() {
        all.sort_by_key(|s| s.id);
        all
    } else {
        let mut selected = Vec::with_capacity(filter.len());
        for id in filter {
            match all.iter().position(|s| s.id == *id) {
                Some(pos) => selected.push(all.swap_remove(pos)),
                None => tracing::warn!("Test-mode sub-forum {} is not in the index", id),
            }
        }
        tracing::info!("Test mode: archiving sub-forums {:?}", filter);
        selected
    };

    for sub_forum in &mut selected {
        let mut topics = index.load_topics(sub_forum.id)?;
        topics.sort_by_key(|t| t.id);
        sub_forum.topics = topics;
    }

    Ok(selected)
}
