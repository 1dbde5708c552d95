//! Cooperative cancellation
//!
//! A [`StopSignal`] is a shared flag the control loop polls at its three
//! safe points (before a sub-forum, a topic and a page). The OS signal
//! listener raises it and saves the checkpoint through the same
//! mutex-guarded [`Checkpointer::save`] the loop uses.

use crate::state::Checkpointer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Shared stop request flag
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the control loop to stop at its next safe point
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Returns true once a stop has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Spawns a task that turns Ctrl-C or SIGTERM into a stop request
///
/// On the first signal the stop flag is raised and the checkpoint is saved
/// immediately, so progress survives even if the process is killed before
/// the loop reaches its next safe point.
pub fn listen_for_shutdown(stop: StopSignal, checkpointer: Arc<Checkpointer>) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;

        tracing::warn!("Shutdown requested, stopping after the current page");
        stop_and_save(&stop, checkpointer).await;
    })
}

/// Raises the stop flag and saves the checkpoint off the async workers
async fn stop_and_save(stop: &StopSignal, checkpointer: Arc<Checkpointer>) {
    stop.request_stop();

    match tokio::task::spawn_blocking(move || checkpointer.save()).await {
        Ok(Ok(())) => tracing::info!("Checkpoint saved on shutdown"),
        Ok(Err(e)) => tracing::error!("Failed to save checkpoint on shutdown: {}", e),
        Err(e) => tracing::error!("Checkpoint save task failed on shutdown: {}", e),
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                Ok(()) = tokio::signal::ctrl_c() => {}
                Some(()) = terminate.recv() => {}
                else => std::future::pending::<()>().await,
            }
        }
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {}", e);
            wait_for_ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

// Without a working handler the process can still be killed; never report a signal
async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}
