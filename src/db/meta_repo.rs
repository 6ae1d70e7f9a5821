use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::sync::StoreError;

const LAST_SYNC_KEY: &str = "last_sync_at";

/// Small key/value store for engine bookkeeping.
pub struct MetaRepository {
    pool: SqlitePool,
}

impl MetaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM sync_meta WHERE key = ?")
            .bind(LAST_SYNC_KEY)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    pub async fn set_last_sync_at(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sync_meta (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(LAST_SYNC_KEY)
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
