//! Port to the remote system of record.

mod http;

pub use http::{payload_from_wire, wire_body, HttpRemoteApi};

use async_trait::async_trait;

use super::error::RemoteError;
use crate::models::{EntityType, NaturalKey, Payload, RemoteId};

/// One create endpoint per entity type, natural-key lookup used to reconcile
/// uniqueness conflicts, and a full listing used to import what the server
/// already holds.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Creates the entity and returns the identity the server assigned.
    /// `payload` must carry no unresolved local references the caller cares
    /// about.
    async fn create(&self, token: &str, payload: &Payload) -> Result<RemoteId, RemoteError>;

    /// Finds an existing entity by its natural key.
    async fn find_by_natural_key(
        &self,
        token: &str,
        entity_type: EntityType,
        key: &NaturalKey,
    ) -> Result<Option<RemoteId>, RemoteError>;

    /// Every entity of `entity_type` the server holds, across all pages.
    /// Parent references come back as remote ids.
    async fn list(
        &self,
        token: &str,
        entity_type: EntityType,
    ) -> Result<Vec<(RemoteId, Payload)>, RemoteError>;
}
