//! Port to the local durable store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StoreError;
use crate::models::{EntityType, LocalId, Payload, Record, RemoteId};

/// Everything the engine needs from local persistence.
///
/// Every write is independent and immediately durable; the engine never
/// spans a transaction across records.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Records of `entity_type` not yet confirmed synced.
    async fn list_pending(&self, entity_type: EntityType) -> Result<Vec<Record>, StoreError>;

    /// Stores an entity that already exists remotely as a Synced record
    /// under a fresh local id. Returns `None` without writing when a record
    /// of the same type already carries `remote_id`.
    async fn import_synced(
        &self,
        payload: &Payload,
        remote_id: RemoteId,
    ) -> Result<Option<Record>, StoreError>;

    /// Transitions every stored copy of the record to Synced.
    async fn mark_synced(
        &self,
        entity_type: EntityType,
        local_id: LocalId,
        remote_id: RemoteId,
    ) -> Result<(), StoreError>;

    async fn load_identity_map(&self)
        -> Result<Vec<(EntityType, LocalId, RemoteId)>, StoreError>;

    async fn save_identity(
        &self,
        entity_type: EntityType,
        local_id: LocalId,
        remote_id: RemoteId,
    ) -> Result<(), StoreError>;

    async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<(), StoreError>;
}
