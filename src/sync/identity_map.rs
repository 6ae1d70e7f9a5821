//! Translation table from local ids to remote ids, scoped per entity type.
//!
//! The map itself is in-memory and pure so the resolver can consult it
//! without I/O. The orchestrator loads it from the local store at the start
//! of a run and persists every new entry as it is added.

use std::collections::HashMap;

use super::error::IdentityConflict;
use crate::models::{EntityType, LocalId, ParentRef, RemoteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// The exact mapping was already present.
    Unchanged,
}

#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    forward: HashMap<(EntityType, LocalId), RemoteId>,
    // First local id seen for each remote id. Two local records can map to
    // the same remote one when a natural-key conflict was reconciled.
    reverse: HashMap<(EntityType, RemoteId), LocalId>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from persisted entries. Later duplicates of a key are
    /// ignored.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (EntityType, LocalId, RemoteId)>,
    ) -> Self {
        let mut map = Self::new();
        for (entity_type, local_id, remote_id) in entries {
            let _ = map.put(entity_type, local_id, remote_id);
        }
        map
    }

    /// Stores a mapping. Re-putting the same mapping is a no-op; remapping a
    /// local id to a different remote id is refused.
    pub fn put(
        &mut self,
        entity_type: EntityType,
        local_id: LocalId,
        remote_id: RemoteId,
    ) -> Result<PutOutcome, IdentityConflict> {
        if let Some(existing) = self.forward.get(&(entity_type, local_id)) {
            if *existing == remote_id {
                return Ok(PutOutcome::Unchanged);
            }
            return Err(IdentityConflict {
                entity_type,
                local_id,
                existing: *existing,
                attempted: remote_id,
            });
        }

        self.forward.insert((entity_type, local_id), remote_id);
        self.reverse
            .entry((entity_type, remote_id))
            .or_insert(local_id);
        Ok(PutOutcome::Inserted)
    }

    pub fn resolve(&self, entity_type: EntityType, local_id: LocalId) -> Option<RemoteId> {
        self.forward.get(&(entity_type, local_id)).copied()
    }

    /// The remote id when known, otherwise the local id itself.
    pub fn resolve_or_default(&self, entity_type: EntityType, local_id: LocalId) -> ParentRef {
        match self.resolve(entity_type, local_id) {
            Some(remote_id) => ParentRef::Remote(remote_id),
            None => ParentRef::Local(local_id),
        }
    }

    /// Reverse lookup.
    pub fn local_for(&self, entity_type: EntityType, remote_id: RemoteId) -> Option<LocalId> {
        self.reverse.get(&(entity_type, remote_id)).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.forward.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_resolve() {
        let mut map = IdentityMap::new();
        assert_eq!(
            map.put(EntityType::Institution, LocalId(1), RemoteId(501)),
            Ok(PutOutcome::Inserted)
        );
        assert_eq!(
            map.resolve(EntityType::Institution, LocalId(1)),
            Some(RemoteId(501))
        );
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_put_same_mapping_twice_is_noop() {
        let mut map = IdentityMap::new();
        map.put(EntityType::Visit, LocalId(10), RemoteId(900)).unwrap();
        assert_eq!(
            map.put(EntityType::Visit, LocalId(10), RemoteId(900)),
            Ok(PutOutcome::Unchanged)
        );
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_put_different_remote_id_conflicts() {
        let mut map = IdentityMap::new();
        map.put(EntityType::Visit, LocalId(10), RemoteId(900)).unwrap();

        let err = map
            .put(EntityType::Visit, LocalId(10), RemoteId(901))
            .unwrap_err();
        assert_eq!(err.existing, RemoteId(900));
        assert_eq!(err.attempted, RemoteId(901));
        // Original mapping untouched
        assert_eq!(map.resolve(EntityType::Visit, LocalId(10)), Some(RemoteId(900)));
    }

    #[test]
    fn test_mappings_are_scoped_per_type() {
        let mut map = IdentityMap::new();
        map.put(EntityType::Institution, LocalId(1), RemoteId(501)).unwrap();
        map.put(EntityType::Visit, LocalId(1), RemoteId(900)).unwrap();

        assert_eq!(
            map.resolve(EntityType::Institution, LocalId(1)),
            Some(RemoteId(501))
        );
        assert_eq!(map.resolve(EntityType::Visit, LocalId(1)), Some(RemoteId(900)));
        assert_eq!(map.resolve(EntityType::Dish, LocalId(1)), None);
    }

    #[test]
    fn test_resolve_or_default_falls_back_to_local() {
        let mut map = IdentityMap::new();
        map.put(EntityType::Institution, LocalId(1), RemoteId(501)).unwrap();

        assert_eq!(
            map.resolve_or_default(EntityType::Institution, LocalId(1)),
            ParentRef::Remote(RemoteId(501))
        );
        assert_eq!(
            map.resolve_or_default(EntityType::Institution, LocalId(2)),
            ParentRef::Local(LocalId(2))
        );
    }

    #[test]
    fn test_reverse_lookup_keeps_first_local_id() {
        let mut map = IdentityMap::new();
        map.put(EntityType::Institution, LocalId(1), RemoteId(501)).unwrap();
        map.put(EntityType::Institution, LocalId(2), RemoteId(501)).unwrap();

        assert_eq!(
            map.local_for(EntityType::Institution, RemoteId(501)),
            Some(LocalId(1))
        );
        assert_eq!(map.local_for(EntityType::Institution, RemoteId(999)), None);
    }

    #[test]
    fn test_from_entries() {
        let map = IdentityMap::from_entries(vec![
            (EntityType::Institution, LocalId(1), RemoteId(501)),
            (EntityType::Dish, LocalId(4), RemoteId(77)),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.resolve(EntityType::Dish, LocalId(4)), Some(RemoteId(77)));
    }
}
