use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{EntityType, LocalId, RemoteId};
use crate::sync::StoreError;

/// Durable copy of the identity map.
pub struct IdentityRepository {
    pool: SqlitePool,
}

impl IdentityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn load_all(&self) -> Result<Vec<(EntityType, LocalId, RemoteId)>, StoreError> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT entity_type, local_id, remote_id FROM identity_map ORDER BY created_at, local_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(entity_type, local_id, remote_id)| {
                match entity_type.parse::<EntityType>() {
                    Ok(entity_type) => Some((entity_type, LocalId(local_id), RemoteId(remote_id))),
                    Err(e) => {
                        tracing::warn!("Ignoring identity mapping: {}", e);
                        None
                    }
                }
            })
            .collect())
    }

    /// Persists a mapping. An existing row for the same key is kept; the
    /// in-memory map is responsible for refusing conflicting values.
    pub async fn insert(
        &self,
        entity_type: EntityType,
        local_id: LocalId,
        remote_id: RemoteId,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO identity_map (entity_type, local_id, remote_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(entity_type.as_str())
        .bind(local_id.0)
        .bind(remote_id.0)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_insert_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = IdentityRepository::new(pool);

        repo.insert(EntityType::Institution, LocalId(1), RemoteId(501))
            .await
            .unwrap();
        repo.insert(EntityType::Visit, LocalId(10), RemoteId(900))
            .await
            .unwrap();
        // Second write for the same key is ignored
        repo.insert(EntityType::Institution, LocalId(1), RemoteId(777))
            .await
            .unwrap();

        let mut entries = repo.load_all().await.unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                (EntityType::Institution, LocalId(1), RemoteId(501)),
                (EntityType::Visit, LocalId(10), RemoteId(900)),
            ]
        );
    }
}
