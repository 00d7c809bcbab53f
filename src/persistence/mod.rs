//! Persistence - sqlx repositories
//!
//! ## Responsibilities
//!
//! - Append-only `tags` / `events` rows written by the database sink
//! - Paginated table reports for the HTTP surface
//! - Age-based row purge hooks consumed by the retention sweeper
//!
//! The pool is the scoped-session boundary: each call acquires a connection,
//! runs one statement and commits implicitly. Rollback isolation for the
//! purge is per entity, handled by the sweeper.

mod event_repository;
mod tag_repository;

pub use event_repository::{EventRepository, EventRow};
pub use tag_repository::{TagRepository, TagRow};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

/// A persisted table the retention sweeper knows how to purge.
#[async_trait]
pub trait PersistedEntity: Send + Sync {
    /// Table name, used for logging and report routing.
    fn table(&self) -> &'static str;

    /// Delete rows older than `cutoff`; returns the number deleted.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error>;
}

/// Paginated table report.
#[derive(Debug, Serialize)]
pub struct TableReport<T: Serialize> {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
    pub data: Vec<T>,
}

/// Create the schema if it does not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device TEXT NOT NULL,
            epc TEXT NOT NULL,
            tid TEXT,
            ant INTEGER,
            rssi INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS ix_tags_device ON tags (device)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS ix_tags_epc ON tags (epc)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS ix_tags_created_at ON tags (created_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device TEXT NOT NULL,
            event_type TEXT NOT NULL,
            event_data TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS ix_events_device ON events (device)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS ix_events_created_at ON events (created_at)")
        .execute(pool)
        .await?;

    Ok(())
}
