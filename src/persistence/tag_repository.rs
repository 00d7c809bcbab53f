//! Tag row repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use super::{PersistedEntity, TableReport};
use crate::tag_registry::TagRecord;

/// One persisted tag row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TagRow {
    pub id: i64,
    pub device: String,
    pub epc: String,
    pub tid: Option<String>,
    pub ant: Option<i32>,
    pub rssi: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TagRepository {
    pool: SqlitePool,
}

impl TagRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one observed tag.
    pub async fn insert(&self, tag: &TagRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO tags (device, epc, tid, ant, rssi, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&tag.device)
        .bind(&tag.epc)
        .bind(&tag.tid)
        .bind(tag.antenna)
        .bind(tag.rssi)
        .bind(tag.first_seen)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Paginated report over persisted tag rows.
    pub async fn report(&self, limit: i64, offset: i64) -> Result<TableReport<TagRow>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
            .fetch_one(&self.pool)
            .await?;

        let data = sqlx::query_as::<_, TagRow>(
            "SELECT id, device, epc, tid, ant, rssi, created_at FROM tags ORDER BY id LIMIT ? OFFSET ?",
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
impl PersistedEntity for TagRepository {
    fn table(&self) -> &'static str {
        "tags"
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tags WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
