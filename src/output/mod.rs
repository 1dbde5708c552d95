//! Output module for progress reporting and statistics
//!
//! This module handles:
//! - Recording run metrics (counters, rates, ETA) while archiving
//! - Summarizing a checkpoint for the `--stats` report

mod metrics;
pub mod stats;

pub use metrics::{MetricsSink, MetricsSnapshot, PageEvent, ProgressMetrics, TopicOutcome};
pub use stats::{load_statistics, print_statistics, ArchiveStatistics};
