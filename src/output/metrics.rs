//! Run metrics and operator-facing progress reporting

use crate::index::TopicId;
use std::time::{Duration, Instant};

/// Something that happened to one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// Downloaded and stored
    Archived {
        topic_id: TopicId,
        page_number: u32,
        bytes: usize,
    },

    /// Already archived by an earlier run
    Skipped { topic_id: TopicId, page_number: u32 },

    /// Download failed
    FetchFailed { topic_id: TopicId, page_number: u32 },

    /// Download succeeded but storing failed
    StoreFailed { topic_id: TopicId, page_number: u32 },
}

/// How processing a topic ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicOutcome {
    /// Every page archived; topic marked done
    Archived,

    /// Some pages failed or the frontier was incomplete
    Incomplete,

    /// The seed could not be canonicalized, fetched or parsed
    DiscoveryFailed,
}

/// Counters at a point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub pages_archived: u64,
    pub bytes_archived: u64,
    pub pages_skipped: u64,
    pub fetch_failures: u64,
    pub store_failures: u64,
    pub topics_archived: u64,
    pub topics_incomplete: u64,
    pub discovery_failures: u64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Page-level failures of any kind
    pub fn page_failures(&self) -> u64 {
        self.fetch_failures + self.store_failures
    }

    /// Archived pages per second over the run so far
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.pages_archived as f64 / secs
        } else {
            0.0
        }
    }
}

/// Receives progress events from the control loop
pub trait MetricsSink: Send {
    /// Called once before the loop with the number of topics still to archive
    fn begin(&mut self, pending_topics: u64);

    /// Adds topics found by a JIT refresh to the pending total
    fn add_pending_topics(&mut self, count: u64);

    fn record_page(&mut self, event: PageEvent);

    fn record_topic(&mut self, outcome: TopicOutcome);

    /// Emits the final report
    fn flush(&mut self);

    fn snapshot(&self) -> MetricsSnapshot;
}

/// Counter-based metrics that log a progress line every few archived pages
#[derive(Debug)]
pub struct ProgressMetrics {
    counters: MetricsSnapshot,
    pending_topics: u64,
    started: Instant,
    report_every: u64,
}

impl ProgressMetrics {
    pub fn new() -> Self {
        Self::with_report_interval(10)
    }

    /// Logs progress every `report_every` archived pages
    pub fn with_report_interval(report_every: u64) -> Self {
        Self {
            counters: MetricsSnapshot::default(),
            pending_topics: 0,
            started: Instant::now(),
            report_every: report_every.max(1),
        }
    }

    /// Estimated time to finish the pending topics at the current topic rate
    pub fn eta(&self) -> Option<Duration> {
        let finished = self.counters.topics_archived + self.counters.topics_incomplete;
        let remaining = self.pending_topics.saturating_sub(finished + self.counters.discovery_failures);
        if finished == 0 || remaining == 0 {
            return None;
        }

        let per_topic = self.started.elapsed().as_secs_f64() / finished as f64;
        Some(Duration::from_secs_f64(per_topic * remaining as f64))
    }

    fn report_progress(&self) {
        let snapshot = self.snapshot();
        let eta = self
            .eta()
            .map(format_duration)
            .unwrap_or_else(|| "unknown".to_string());

        tracing::info!(
            "Progress: {} pages archived ({} KiB), {} topics done, {} failures, {:.2} pages/sec, ETA {}",
            snapshot.pages_archived,
            snapshot.bytes_archived / 1024,
            snapshot.topics_archived,
            snapshot.page_failures(),
            snapshot.pages_per_second(),
            eta
        );
    }
}

impl Default for ProgressMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for ProgressMetrics {
    fn begin(&mut self, pending_topics: u64) {
        self.pending_topics = pending_topics;
        self.started = Instant::now();
        tracing::info!("{} topic(s) pending", pending_topics);
    }

    fn add_pending_topics(&mut self, count: u64) {
        self.pending_topics += count;
    }

    fn record_page(&mut self, event: PageEvent) {
        match event {
            PageEvent::Archived { bytes, .. } => {
                self.counters.pages_archived += 1;
                self.counters.bytes_archived += bytes as u64;
                if self.counters.pages_archived % self.report_every == 0 {
                    self.report_progress();
                }
            }
            PageEvent::Skipped { .. } => self.counters.pages_skipped += 1,
            PageEvent::FetchFailed { .. } => self.counters.fetch_failures += 1,
            PageEvent::StoreFailed { .. } => self.counters.store_failures += 1,
        }
    }

    fn record_topic(&mut self, outcome: TopicOutcome) {
        match outcome {
            TopicOutcome::Archived => self.counters.topics_archived += 1,
            TopicOutcome::Incomplete => self.counters.topics_incomplete += 1,
            TopicOutcome::DiscoveryFailed => self.counters.discovery_failures += 1,
        }
    }

    fn flush(&mut self) {
        let snapshot = self.snapshot();
        tracing::info!(
            "Run finished in {}: {} pages archived, {} skipped, {} fetch failures, {} store failures; \
             {} topics archived, {} incomplete, {} discovery failures",
            format_duration(snapshot.elapsed),
            snapshot.pages_archived,
            snapshot.pages_skipped,
            snapshot.fetch_failures,
            snapshot.store_failures,
            snapshot.topics_archived,
            snapshot.topics_incomplete,
            snapshot.discovery_failures
        );
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            elapsed: self.started.elapsed(),
            ..self.counters.clone()
        }
    }
}

/// Formats a duration as `1h02m03s`
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut metrics = ProgressMetrics::new();
        metrics.begin(3);

        metrics.record_page(PageEvent::Archived {
            topic_id: 1,
            page_number: 1,
            bytes: 2048,
        });
        metrics.record_page(PageEvent::Skipped {
            topic_id: 1,
            page_number: 2,
        });
        metrics.record_page(PageEvent::FetchFailed {
            topic_id: 2,
            page_number: 1,
        });
        metrics.record_page(PageEvent::StoreFailed {
            topic_id: 2,
            page_number: 2,
        });
        metrics.record_topic(TopicOutcome::Archived);
        metrics.record_topic(TopicOutcome::Incomplete);
        metrics.record_topic(TopicOutcome::DiscoveryFailed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.pages_archived, 1);
        assert_eq!(snapshot.bytes_archived, 2048);
        assert_eq!(snapshot.pages_skipped, 1);
        assert_eq!(snapshot.page_failures(), 2);
        assert_eq!(snapshot.topics_archived, 1);
        assert_eq!(snapshot.topics_incomplete, 1);
        assert_eq!(snapshot.discovery_failures, 1);
    }

    #[test]
    fn test_eta_unknown_before_first_topic() {
        let mut metrics = ProgressMetrics::new();
        metrics.begin(10);
        assert_eq!(metrics.eta(), None);

        metrics.record_topic(TopicOutcome::Archived);
        assert!(metrics.eta().is_some());
    }

    #[test]
    fn test_eta_none_when_nothing_remains() {
        let mut metrics = ProgressMetrics::new();
        metrics.begin(1);
        metrics.record_topic(TopicOutcome::Archived);
        assert_eq!(metrics.eta(), None);
    }

    #[test]
    fn test_pending_topics_grow_with_refresh() {
        let mut metrics = ProgressMetrics::new();
        metrics.begin(1);
        metrics.add_pending_topics(2);
        metrics.record_topic(TopicOutcome::Archived);
        assert!(metrics.eta().is_some());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h02m03s");
    }
}
