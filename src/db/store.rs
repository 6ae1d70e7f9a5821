use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::{IdentityRepository, MetaRepository, RecordRepository};
use crate::models::{EntityType, LocalId, Payload, Record, RemoteId};
use crate::sync::{LocalStore, StoreError};

/// SQLite-backed local store used by the sync engine.
pub struct SqliteStore {
    records: RecordRepository,
    identities: IdentityRepository,
    meta: MetaRepository,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            records: RecordRepository::new(pool.clone()),
            identities: IdentityRepository::new(pool.clone()),
            meta: MetaRepository::new(pool),
        }
    }

    pub fn records(&self) -> &RecordRepository {
        &self.records
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn list_pending(&self, entity_type: EntityType) -> Result<Vec<Record>, StoreError> {
        self.records.list_pending(entity_type).await
    }

    async fn import_synced(
        &self,
        payload: &Payload,
        remote_id: RemoteId,
    ) -> Result<Option<Record>, StoreError> {
        self.records.import_synced(payload, remote_id).await
    }

    async fn mark_synced(
        &self,
        entity_type: EntityType,
        local_id: LocalId,
        remote_id: RemoteId,
    ) -> Result<(), StoreError> {
        let updated = self
            .records
            .mark_synced(entity_type, local_id, remote_id)
            .await?;
        if updated == 0 {
            tracing::debug!(%entity_type, %local_id, "No pending row left to mark synced");
        }
        Ok(())
    }

    async fn load_identity_map(
        &self,
    ) -> Result<Vec<(EntityType, LocalId, RemoteId)>, StoreError> {
        self.identities.load_all().await
    }

    async fn save_identity(
        &self,
        entity_type: EntityType,
        local_id: LocalId,
        remote_id: RemoteId,
    ) -> Result<(), StoreError> {
        self.identities
            .insert(entity_type, local_id, remote_id)
            .await
    }

    async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.meta.last_sync_at().await
    }

    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.meta.set_last_sync_at(at).await
    }
}
