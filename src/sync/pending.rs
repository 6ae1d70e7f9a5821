use std::sync::Arc;

use super::error::StoreError;
use super::store::LocalStore;
use crate::models::{EntityType, Record};

/// Selects the records of a type still waiting to be pushed.
#[derive(Clone)]
pub struct PendingSet {
    store: Arc<dyn LocalStore>,
}

impl PendingSet {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Pending records ordered by local id. The sort is stable, so copies
    /// sharing a local id keep their storage order.
    pub async fn select(&self, entity_type: EntityType) -> Result<Vec<Record>, StoreError> {
        let mut records = self.store.list_pending(entity_type).await?;
        records.retain(|r| r.is_pending() && r.entity_type() == entity_type);
        records.sort_by_key(|r| r.local_id);
        Ok(records)
    }

    /// Total pending records across every entity type.
    pub async fn count(&self) -> Result<usize, StoreError> {
        let mut total = 0;
        for entity_type in EntityType::SYNC_ORDER {
            total += self.select(entity_type).await?.len();
        }
        Ok(total)
    }
}
