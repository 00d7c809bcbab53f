//! RetentionSweeper - Tag Aging and Row Purge
//!
//! Two independent periodic jobs:
//!
//! - **Tag aging**: every configured interval, drop registry entries not seen
//!   within that interval. Without a configured interval the job idles at a
//!   fixed poll cadence.
//! - **Row purge**: once at startup and then daily at local midnight, delete
//!   persisted rows older than the retention window from every registered
//!   entity. A failure on one entity is logged and does not abort the others.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Local, Utc};
use tokio_util::sync::CancellationToken;

use crate::persistence::PersistedEntity;
use crate::tag_registry::TagRegistry;

/// Poll cadence when tag aging is not configured.
const IDLE_POLL: Duration = Duration::from_secs(60);

pub struct RetentionSweeper {
    registry: Arc<TagRegistry>,
    entities: Vec<Arc<dyn PersistedEntity>>,
    /// Tag age-out interval in seconds; `None` disables the sweep.
    tag_interval_secs: Option<u64>,
    /// Persisted-row retention in days; `None` disables the purge.
    storage_days: Option<i64>,
}

impl RetentionSweeper {
    pub fn new(
        registry: Arc<TagRegistry>,
        entities: Vec<Arc<dyn PersistedEntity>>,
        tag_interval_secs: Option<u64>,
        storage_days: Option<i64>,
    ) -> Self {
        Self {
            registry,
            entities,
            tag_interval_secs,
            storage_days,
        }
    }

    /// Age out stale registry entries until cancelled.
    pub async fn run_tag_aging(&self, cancel: CancellationToken) {
        loop {
            let interval_secs = match self.tag_interval_secs {
                Some(secs) => secs,
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                    }
                    continue;
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(interval_secs)) => {}
            }

            if self.registry.count().await == 0 {
                continue;
            }

            let cutoff = Utc::now() - ChronoDuration::seconds(interval_secs as i64);
            tracing::info!(cutoff = %cutoff, "Removing tags not seen within the aging interval");
            self.registry.remove_before(cutoff).await;
        }

        tracing::info!("Tag aging sweeper stopped");
    }

    /// Purge old persisted rows: once now, then daily at local midnight.
    pub async fn run_row_purge(&self, cancel: CancellationToken) {
        loop {
            self.purge_once().await;

            let wait = until_next_local_midnight(Local::now());
            tracing::debug!(seconds = wait.as_secs(), "Next row purge at local midnight");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        tracing::info!("Row purge sweeper stopped");
    }

    /// One purge pass over every registered entity, failures isolated.
    pub async fn purge_once(&self) {
        let Some(days) = self.storage_days else {
            tracing::warn!("Storage retention not configured; skipping row purge");
            return;
        };
        if self.entities.is_empty() {
            tracing::warn!("No persisted entities registered; skipping row purge");
            return;
        }

        let cutoff = Utc::now() - ChronoDuration::days(days);
        tracing::info!(days, cutoff = %cutoff, "Purging persisted rows");

        for entity in &self.entities {
            match entity.purge_before(cutoff).await {
                Ok(0) => {
                    tracing::info!(table = entity.table(), "No old rows to delete");
                }
                Ok(deleted) => {
                    tracing::info!(table = entity.table(), deleted, "Deleted old rows");
                }
                Err(e) => {
                    tracing::error!(table = entity.table(), error = %e, "Row purge failed");
                }
            }
        }
    }
}

/// Duration from `now` to the next local midnight.
fn until_next_local_midnight(now: DateTime<Local>) -> Duration {
    let tomorrow = (now + ChronoDuration::days(1)).date_naive();
    let midnight = tomorrow.and_hms_opt(0, 0, 0).unwrap_or_default();
    let seconds = (midnight - now.naive_local()).num_seconds().max(1);
    Duration::from_secs(seconds as u64)
}
