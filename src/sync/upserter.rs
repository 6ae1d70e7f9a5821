use std::sync::Arc;

use super::error::{RemoteError, SyncItemError};
use super::remote::RemoteApi;
use crate::models::{Record, RemoteId};

/// Pushes single records to the remote API.
///
/// Stateless: marking a record Synced is the caller's job.
#[derive(Clone)]
pub struct RemoteUpserter {
    remote: Arc<dyn RemoteApi>,
}

impl RemoteUpserter {
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self { remote }
    }

    /// Creates `record` remotely and returns its remote id.
    ///
    /// A natural-key conflict is reconciled by looking the existing entity
    /// up and returning its id, so re-pushing a record with a stable
    /// natural key is idempotent. Every other failure is returned for the
    /// record; nothing is retried within the call.
    pub async fn create(&self, token: &str, record: &Record) -> Result<RemoteId, SyncItemError> {
        let entity_type = record.entity_type();
        let fail = |e: RemoteError| SyncItemError::new(entity_type, record.local_id, e);

        let conflict = match self.remote.create(token, &record.payload).await {
            Ok(remote_id) => return Ok(remote_id),
            Err(conflict @ RemoteError::Conflict { .. }) => conflict,
            Err(e) => return Err(fail(e)),
        };

        let Some(key) = record.payload.natural_key() else {
            // Nothing to look the existing entity up by
            return Err(fail(conflict));
        };

        tracing::debug!(
            entity_type = %entity_type,
            local_id = %record.local_id,
            field = key.field,
            value = %key.value,
            "Create conflicted, looking up existing remote entity"
        );

        match self
            .remote
            .find_by_natural_key(token, entity_type, &key)
            .await
        {
            Ok(Some(remote_id)) => Ok(remote_id),
            Ok(None) => Err(fail(RemoteError::Rejected {
                status: 409,
                message: format!(
                    "{} '{}' conflicts but no existing entity was found",
                    key.field, key.value
                ),
            })),
            Err(e) => Err(fail(e)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedRemote;
    use super::*;
    use crate::models::{Dish, EntityType, Institution, LocalId, ParentRef};
    use crate::sync::error::ItemFailure;

    fn institution() -> Record {
        Record::new(LocalId(1), Institution::new("ESC001", "Escuela 1", "escuela"))
    }

    fn conflict() -> RemoteError {
        RemoteError::Conflict {
            field: "codigo".to_string(),
            value: "ESC001".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_returns_new_identity() {
        let remote = Arc::new(ScriptedRemote::new());
        remote.script(EntityType::Institution, Ok(RemoteId(501)));
        let upserter = RemoteUpserter::new(remote.clone());

        let remote_id = upserter.create("token", &institution()).await.unwrap();
        assert_eq!(remote_id, RemoteId(501));
        assert_eq!(remote.created().len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_resolves_to_existing_identity() {
        let remote = Arc::new(ScriptedRemote::new());
        remote.script(EntityType::Institution, Err(conflict()));
        remote.existing("ESC001", RemoteId(501));
        let upserter = RemoteUpserter::new(remote.clone());

        let remote_id = upserter.create("token", &institution()).await.unwrap();
        assert_eq!(remote_id, RemoteId(501));
        assert_eq!(*remote.lookup_calls.lock().unwrap(), vec!["ESC001".to_string()]);
    }

    #[tokio::test]
    async fn test_conflict_without_existing_entity_fails() {
        let remote = Arc::new(ScriptedRemote::new());
        remote.script(EntityType::Institution, Err(conflict()));
        let upserter = RemoteUpserter::new(remote);

        let err = upserter.create("token", &institution()).await.unwrap_err();
        assert_eq!(err.local_id, LocalId(1));
        assert!(matches!(
            err.failure,
            ItemFailure::Remote(RemoteError::Rejected { status: 409, .. })
        ));
    }

    #[tokio::test]
    async fn test_conflict_without_natural_key_is_surfaced() {
        let remote = Arc::new(ScriptedRemote::new());
        remote.script(EntityType::Dish, Err(conflict()));
        let upserter = RemoteUpserter::new(remote.clone());
        let dish = Record::new(LocalId(4), Dish::new(ParentRef::Remote(RemoteId(9)), "Guiso"));

        let err = upserter.create("token", &dish).await.unwrap_err();
        assert!(matches!(
            err.failure,
            ItemFailure::Remote(RemoteError::Conflict { .. })
        ));
        assert!(remote.lookup_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_propagated_without_retry() {
        let remote = Arc::new(ScriptedRemote::new());
        remote.script(EntityType::Institution, Err(RemoteError::Timeout));
        let upserter = RemoteUpserter::new(remote.clone());

        let err = upserter.create("token", &institution()).await.unwrap_err();
        assert_eq!(err.entity_type, EntityType::Institution);
        assert!(err.is_transient());
        assert_eq!(remote.created().len(), 1);
    }
}
