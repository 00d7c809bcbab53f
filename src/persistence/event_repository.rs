//! Event row repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use super::{PersistedEntity, TableReport};

/// One persisted event row. `event_data` is stored as JSON text.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EventRow {
    pub id: i64,
    pub device: String,
    pub event_type: String,
    pub event_data: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct EventRepository {
    pool: SqlitePool,
}

impl EventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one device event.
    pub async fn insert(
        &self,
        device: &str,
        event_type: &str,
        event_data: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO events (device, event_type, event_data, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(device)
        .bind(event_type)
        .bind(event_data)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Paginated report over persisted event rows.
    pub async fn report(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<TableReport<EventRow>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;

        let data = sqlx::query_as::<_, EventRow>(
            "SELECT id, device, event_type, event_data, created_at FROM events ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(TableReport {
            total,
            limit,
            offset,
            has_more: offset + limit < total,
            data,
        })
    }
}

#[async_trait]
impl PersistedEntity for EventRepository {
    fn table(&self) -> &'static str {
        "events"
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
