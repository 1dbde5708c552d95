//! Crawler module for forum archiving
//!
//! This module contains the core archiving logic, including:
//! - HTTP fetching with a politeness delay
//! - Pagination and topic-listing parsing
//! - Per-topic frontier discovery and JIT listing refresh
//! - The checkpointed control loop and cooperative shutdown

mod coordinator;
mod fetcher;
mod frontier;
mod jit;
mod parser;
mod shutdown;

pub use coordinator::{Collaborators, Coordinator, RunOutcome, RunSummary};
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher};
pub use frontier::{Frontier, FrontierDiscoverer, FrontierPage};
pub use jit::{should_refresh, JitRefresher};
pub use parser::{
    HtmlPaginationParser, HtmlTopicExtractor, ListedTopic, PaginationParser, TopicExtractor,
};
pub use shutdown::{listen_for_shutdown, StopSignal};

use crate::config::Config;
use crate::index::SqliteIndex;
use crate::output::ProgressMetrics;
use crate::state::Checkpointer;
use crate::storage::{ensure_writable, FsPageStore};
use crate::ArchiverError;
use std::path::Path;
use std::sync::Arc;

/// Runs a complete archive operation
///
/// This is the main entry point for starting a run. It will:
/// 1. Load the checkpoint (or start fresh)
/// 2. Check the archive root is writable
/// 3. Open the topic index
/// 4. Build the HTTP fetcher
/// 5. Install the shutdown listener
/// 6. Run the control loop
///
/// Failures in steps 1-4 are fatal and happen before any page is fetched.
///
/// # Arguments
///
/// * `config` - The archiver configuration
/// * `fresh` - Ignore the existing checkpoint and start from nothing
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run completed or was cancelled cleanly
/// * `Err(ArchiverError)` - Startup failed or a checkpoint could not be saved
pub async fn crawl(config: Config, fresh: bool) -> Result<RunSummary, ArchiverError> {
    let state_path = Path::new(&config.output.state_path);
    let checkpointer = if fresh {
        tracing::info!("Starting from an empty checkpoint");
        Checkpointer::fresh(state_path)
    } else {
        Checkpointer::load(state_path)?
    };
    let checkpointer = Arc::new(checkpointer);

    let archive_root = Path::new(&config.output.archive_root);
    ensure_writable(archive_root)?;

    let index = SqliteIndex::open(Path::new(&config.output.index_path))?;
    let fetcher = HttpFetcher::new(&config.crawler, &config.user_agent)?;
    let store = FsPageStore::new(archive_root, config.forum.page_extension.clone());

    let stop = StopSignal::new();
    let listener = listen_for_shutdown(stop.clone(), Arc::clone(&checkpointer));

    let coordinator = Coordinator::new(
        config,
        checkpointer,
        Collaborators {
            fetcher: Arc::new(fetcher),
            store: Arc::new(store),
            index: Box::new(index),
            metrics: Box::new(ProgressMetrics::new()),
        },
        stop,
    )?;

    let result = coordinator.run().await;
    listener.abort();
    result
}
