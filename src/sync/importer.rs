//! Pulls entities the server already holds into the local store.
//!
//! Imported records are stored Synced with their identity mapping, so a
//! record created offline can name one of them as its parent and the
//! resolver finds the remote id like for any pushed parent.

use std::sync::Arc;

use super::error::StoreError;
use super::identity_map::IdentityMap;
use super::remote::RemoteApi;
use super::store::LocalStore;
use crate::models::{EntityType, ParentRef};

/// Types imported before each push. Dishes and ingredients are only ever
/// recorded in the field.
pub const IMPORTED_TYPES: [EntityType; 2] = [EntityType::Institution, EntityType::Visit];

pub struct RemoteImporter {
    remote: Arc<dyn RemoteApi>,
    store: Arc<dyn LocalStore>,
}

impl RemoteImporter {
    pub fn new(remote: Arc<dyn RemoteApi>, store: Arc<dyn LocalStore>) -> Self {
        Self { remote, store }
    }

    /// Imports every remote entity of [`IMPORTED_TYPES`] not yet known
    /// locally and returns how many were added.
    ///
    /// A type whose listing fails is skipped with a warning. Entities whose
    /// parent is unknown locally are left out. Only a store failure is
    /// returned as an error.
    pub async fn import(&self, token: &str, map: &mut IdentityMap) -> Result<usize, StoreError> {
        let mut imported = 0;

        for entity_type in IMPORTED_TYPES {
            let rows = match self.remote.list(token, entity_type).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(%entity_type, "Import skipped: {}", e);
                    continue;
                }
            };

            let mut added = 0;
            for (remote_id, payload) in rows {
                if map.local_for(entity_type, remote_id).is_some() {
                    continue;
                }

                if let (Some(parent_type), Some(ParentRef::Remote(parent_id))) =
                    (entity_type.parent(), payload.parent_ref())
                {
                    if map.local_for(parent_type, parent_id).is_none() {
                        tracing::debug!(
                            %entity_type,
                            %remote_id,
                            %parent_type,
                            parent = %parent_id,
                            "Parent not known locally, not importing"
                        );
                        continue;
                    }
                }

                let Some(record) = self.store.import_synced(&payload, remote_id).await? else {
                    continue;
                };
                // Persisted before the in-memory map learns about it
                self.store
                    .save_identity(entity_type, record.local_id, remote_id)
                    .await?;
                if let Err(conflict) = map.put(entity_type, record.local_id, remote_id) {
                    tracing::warn!("Identity map conflict on import: {}", conflict);
                    continue;
                }
                added += 1;
            }

            if added > 0 {
                tracing::info!(%entity_type, count = added, "Imported remote records");
            }
            imported += added;
        }

        Ok(imported)
    }
}
