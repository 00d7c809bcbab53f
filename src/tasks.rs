//! Background task ownership
//!
//! Every detached task (fan-out deliveries, supervisor loops, sweepers) is
//! spawned through a [`TaskSet`], so shutdown can cancel and drain all of them
//! instead of leaving orphaned work behind. Shutdown is idempotent.

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Owner of all background tasks spawned by the connector.
pub struct TaskSet {
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl TaskSet {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn a tracked task. Dropped silently once shutdown has begun.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            tracing::debug!("Task set already shut down; dropping spawn request");
            return;
        }
        self.tracker.spawn(fut);
    }

    /// Token handed to long-lived loops so they can observe cancellation.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every task and wait for them to finish. Safe to call twice.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Default for TaskSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_cancels_long_running_tasks() {
        let tasks = Arc::new(TaskSet::new());
        let finished = Arc::new(AtomicBool::new(false));

        let cancel = tasks.cancel_token();
        let flag = finished.clone();
        tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(3600)) => {
                    flag.store(true, Ordering::SeqCst);
                }
            }
        });

        tasks.shutdown().await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_blocks_new_spawns() {
        let tasks = TaskSet::new();
        tasks.shutdown().await;
        tasks.shutdown().await;

        // A spawn after shutdown is a no-op rather than an orphan.
        tasks.spawn(async {});
        tasks.shutdown().await;
    }
}
