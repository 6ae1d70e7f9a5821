use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{EntityType, LocalId, Payload, Record, RemoteId, SyncState};
use crate::sync::StoreError;

pub struct RecordRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    entity_type: String,
    local_id: i64,
    remote_id: Option<i64>,
    sync_state: String,
    payload: String,
    created_at: String,
}

impl RecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores a new Pending record under a fresh local id.
    pub async fn create(&self, payload: impl Into<Payload>) -> Result<Record, StoreError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(local_id) FROM records")
            .fetch_one(&self.pool)
            .await?;

        let record = Record::new(LocalId::generate(max.map(LocalId)), payload);
        self.insert(&record).await?;
        Ok(record)
    }

    /// Stores a copy of a remote entity as Synced under a fresh local id,
    /// unless a record of the same type already carries `remote_id`.
    pub async fn import_synced(
        &self,
        payload: &Payload,
        remote_id: RemoteId,
    ) -> Result<Option<Record>, StoreError> {
        let entity_type = payload.entity_type();
        let known: Option<i64> = sqlx::query_scalar(
            "SELECT local_id FROM records WHERE entity_type = ? AND remote_id = ? LIMIT 1",
        )
        .bind(entity_type.as_str())
        .bind(remote_id.0)
        .fetch_optional(&self.pool)
        .await?;
        if known.is_some() {
            return Ok(None);
        }

        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(local_id) FROM records")
            .fetch_one(&self.pool)
            .await?;

        let mut record = Record::new(LocalId::generate(max.map(LocalId)), payload.clone());
        record.mark_synced(remote_id);
        self.insert(&record).await?;
        Ok(Some(record))
    }

    /// Stores `record` as-is. Does not check for an existing row with the
    /// same local id.
    pub async fn insert(&self, record: &Record) -> Result<(), StoreError> {
        let entity_type = record.entity_type();
        let payload = serde_json::to_string(&record.payload).map_err(|e| StoreError::Corrupt {
            entity_type: entity_type.to_string(),
            local_id: record.local_id.0,
            reason: e.to_string(),
        })?;
        let created_at = record.created_at.to_rfc3339();
        let updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO records (entity_type, local_id, remote_id, sync_state, payload, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entity_type.as_str())
        .bind(record.local_id.0)
        .bind(record.remote_id.map(|id| id.0))
        .bind(record.sync_state.to_string())
        .bind(&payload)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(
        &self,
        entity_type: EntityType,
        local_id: LocalId,
    ) -> Result<Option<Record>, StoreError> {
        let row: Option<RecordRow> = sqlx::query_as(
            "SELECT * FROM records WHERE entity_type = ? AND local_id = ? ORDER BY row_id LIMIT 1",
        )
        .bind(entity_type.as_str())
        .bind(local_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(hydrate_record).transpose()
    }

    /// All records of a type, by local id then insertion order.
    pub async fn list(&self, entity_type: EntityType) -> Result<Vec<Record>, StoreError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT * FROM records WHERE entity_type = ? ORDER BY local_id, row_id",
        )
        .bind(entity_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(hydrate_readable(rows))
    }

    pub async fn list_pending(&self, entity_type: EntityType) -> Result<Vec<Record>, StoreError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT * FROM records WHERE entity_type = ? AND sync_state = 'pending' ORDER BY local_id, row_id",
        )
        .bind(entity_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(hydrate_readable(rows))
    }

    /// Marks every Pending copy of the record Synced. Rows already Synced
    /// keep their remote id.
    pub async fn mark_synced(
        &self,
        entity_type: EntityType,
        local_id: LocalId,
        remote_id: RemoteId,
    ) -> Result<u64, StoreError> {
        let updated_at = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE records
            SET remote_id = ?, sync_state = 'synced', updated_at = ?
            WHERE entity_type = ? AND local_id = ? AND sync_state = 'pending'
            "#,
        )
        .bind(remote_id.0)
        .bind(&updated_at)
        .bind(entity_type.as_str())
        .bind(local_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Skips rows that cannot be decoded so one bad row does not block the rest.
fn hydrate_readable(rows: Vec<RecordRow>) -> Vec<Record> {
    rows.into_iter()
        .filter_map(|row| match hydrate_record(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping unreadable record: {}", e);
                None
            }
        })
        .collect()
}

fn hydrate_record(row: RecordRow) -> Result<Record, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        entity_type: row.entity_type.clone(),
        local_id: row.local_id,
        reason,
    };

    let payload: Payload = serde_json::from_str(&row.payload).map_err(|e| corrupt(e.to_string()))?;
    if payload.entity_type().as_str() != row.entity_type {
        return Err(corrupt(format!("payload is a {}", payload.entity_type())));
    }

    let sync_state: SyncState = row.sync_state.parse().map_err(corrupt)?;
    // A Pending row never carries a trustworthy remote id
    let remote_id = match sync_state {
        SyncState::Synced => row.remote_id.map(RemoteId),
        SyncState::Pending => None,
    };

    Ok(Record {
        local_id: LocalId(row.local_id),
        remote_id,
        sync_state,
        payload,
        created_at: DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::{Dish, Institution, ParentRef};
    use tempfile::TempDir;

    struct TestContext {
        repo: RecordRepository,
        _temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn setup_repo() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = init_db(&db_path).await.unwrap();
        TestContext {
            repo: RecordRepository::new(pool),
            _temp_dir: temp_dir,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_record() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let created = repo
            .create(Institution::new("ESC001", "Escuela 1", "escuela").with_district("7"))
            .await
            .unwrap();
        assert!(created.is_pending());

        let fetched = repo
            .get(EntityType::Institution, created.local_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.payload, created.payload);
        assert_eq!(fetched.sync_state, SyncState::Pending);
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_local_ids() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let first = repo
            .create(Institution::new("A", "A", "escuela"))
            .await
            .unwrap();
        let second = repo
            .create(Institution::new("B", "B", "escuela"))
            .await
            .unwrap();
        assert!(second.local_id > first.local_id);
    }

    #[tokio::test]
    async fn test_get_scoped_by_type() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let record = Record::new(LocalId(5), Dish::new(ParentRef::Local(LocalId(1)), "Sopa"));
        repo.insert(&record).await.unwrap();

        assert!(repo.get(EntityType::Dish, LocalId(5)).await.unwrap().is_some());
        assert!(repo.get(EntityType::Visit, LocalId(5)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_pending_orders_by_local_id() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        for id in [3, 1, 2] {
            let record = Record::new(
                LocalId(id),
                Institution::new(format!("C{}", id), "x", "escuela"),
            );
            repo.insert(&record).await.unwrap();
        }

        let pending = repo.list_pending(EntityType::Institution).await.unwrap();
        let ids: Vec<i64> = pending.iter().map(|r| r.local_id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_mark_synced_updates_all_copies_once() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let record = Record::new(LocalId(7), Institution::new("ESC007", "Dup", "escuela"));
        repo.insert(&record).await.unwrap();
        repo.insert(&record).await.unwrap();

        let updated = repo
            .mark_synced(EntityType::Institution, LocalId(7), RemoteId(501))
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert!(repo
            .list_pending(EntityType::Institution)
            .await
            .unwrap()
            .is_empty());

        // Synced rows never regress or get remapped
        let again = repo
            .mark_synced(EntityType::Institution, LocalId(7), RemoteId(999))
            .await
            .unwrap();
        assert_eq!(again, 0);
        let fetched = repo
            .get(EntityType::Institution, LocalId(7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.remote_id, Some(RemoteId(501)));
        assert_eq!(fetched.sync_state, SyncState::Synced);
    }

    #[tokio::test]
    async fn test_import_synced_skips_known_remote_id() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;
        let payload: Payload = Institution::new("ESC001", "Escuela 1", "escuela").into();

        let imported = repo
            .import_synced(&payload, RemoteId(501))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(imported.sync_state, SyncState::Synced);
        assert_eq!(imported.remote_id, Some(RemoteId(501)));
        assert!(repo
            .list_pending(EntityType::Institution)
            .await
            .unwrap()
            .is_empty());

        let fetched = repo
            .get(EntityType::Institution, imported.local_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.remote_id, Some(RemoteId(501)));

        assert!(repo
            .import_synced(&payload, RemoteId(501))
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.list(EntityType::Institution).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_rows_are_skipped_in_lists() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        sqlx::query(
            "INSERT INTO records (entity_type, local_id, sync_state, payload, created_at, updated_at) VALUES ('institution', 1, 'pending', 'not json', '', '')",
        )
        .execute(&repo.pool)
        .await
        .unwrap();
        repo.insert(&Record::new(LocalId(2), Institution::new("OK", "ok", "escuela")))
            .await
            .unwrap();

        let pending = repo.list_pending(EntityType::Institution).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].local_id, LocalId(2));

        assert!(matches!(
            repo.get(EntityType::Institution, LocalId(1)).await,
            Err(StoreError::Corrupt { local_id: 1, .. })
        ));
    }
}
