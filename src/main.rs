//! Forum-Archiver main entry point
//!
//! This is the command-line interface for the Forum-Archiver engine.

use anyhow::Context;
use clap::Parser;
use forum_archiver::config::{load_config_with_hash, Config};
use forum_archiver::crawler::{crawl, RunOutcome};
use forum_archiver::index::{IndexSource, SqliteIndex};
use forum_archiver::output::{load_statistics, print_statistics, ArchiveStatistics};
use forum_archiver::state::load_state;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Forum-Archiver: a resumable forum archiving engine
///
/// Forum-Archiver downloads every page of every topic listed in a topic
/// index, checkpointing progress so an interrupted run resumes where it
/// stopped, and re-scans sub-forum listings for topics added since the
/// index was built.
#[derive(Parser, Debug)]
#[command(name = "forum-archiver")]
#[command(version = "1.0.0")]
#[command(about = "A resumable forum archiving engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start from an empty checkpoint, ignoring previous progress
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    fresh: bool,

    /// Validate config and show what would be archived without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the checkpoint and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_archive(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_archiver=info,warn"),
            1 => EnvFilter::new("forum_archiver=debug,info"),
            2 => EnvFilter::new("forum_archiver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be archived
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Forum-Archiver Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay);
    println!("  Request timeout: {}s", config.crawler.request_timeout);
    println!(
        "  Checkpoint interval: {} pages",
        config.crawler.checkpoint_interval
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nForum:");
    println!("  Base URL: {}", config.forum.base_url);
    println!(
        "  Parameters: sub-forum={}, topic={}, page={}",
        config.forum.subforum_param, config.forum.topic_param, config.forum.page_param
    );

    println!("\nJIT Refresh:");
    if config.jit.enabled {
        println!(
            "  Enabled: up to {} listing page(s), at most every {}s",
            config.jit.max_pages, config.jit.min_interval
        );
    } else {
        println!("  Disabled");
    }

    println!("\nOutput:");
    println!("  Archive root: {}", config.output.archive_root);
    println!("  State file: {}", config.output.state_path);
    println!("  Index: {}", config.output.index_path);

    let index = SqliteIndex::open(Path::new(&config.output.index_path))
        .context("failed to open topic index")?;
    let sub_forums = index.load_sub_forums()?;
    let selected: Vec<_> = sub_forums
        .iter()
        .filter(|s| config.test_mode.is_disabled() || config.test_mode.sub_forums.contains(&s.id))
        .collect();

    println!("\nSub-forums ({} of {}):", selected.len(), sub_forums.len());
    let mut total_topics = 0;
    for sub_forum in &selected {
        let topics = index.load_topics(sub_forum.id)?.len();
        total_topics += topics;
        println!("  - [{}] {} ({} topics)", sub_forum.id, sub_forum.name, topics);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would archive {} indexed topics", total_topics);

    Ok(())
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let state_path = Path::new(&config.output.state_path);
    println!("State file: {}\n", state_path.display());

    let state = load_state(state_path).context("failed to read checkpoint")?;

    // The report still works without an index, just without totals
    let stats = match SqliteIndex::open(Path::new(&config.output.index_path)) {
        Ok(index) => load_statistics(&state, &index)?,
        Err(e) => {
            tracing::warn!("Topic index unavailable, showing checkpoint only: {}", e);
            ArchiveStatistics::from_state(&state)
        }
    };

    print_statistics(&stats);

    Ok(())
}

/// Handles the main archive operation
async fn handle_archive(config: Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh run (ignoring previous progress)");
    } else {
        tracing::info!("Starting run (resuming from {})", config.output.state_path);
    }

    let summary = crawl(config, fresh).await.context("archive run failed")?;

    match summary.outcome {
        RunOutcome::Completed => tracing::info!(
            "Run completed: {} pages archived, {} page failures",
            summary.metrics.pages_archived,
            summary.metrics.page_failures()
        ),
        RunOutcome::Cancelled => tracing::info!(
            "Run stopped early: {} pages archived; rerun to resume",
            summary.metrics.pages_archived
        ),
    }

    Ok(())
}
