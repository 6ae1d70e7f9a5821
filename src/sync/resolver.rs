//! Foreign-key rewriting ahead of a push.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::identity_map::IdentityMap;
use crate::models::{EntityType, LocalId, ParentRef, Record};

/// What to do with a child whose parent has no remote id yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingParentPolicy {
    /// Push the child with the raw local parent id.
    #[default]
    Fallback,
    /// Leave the child Pending and retry it on a later run.
    Skip,
}

impl fmt::Display for MissingParentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingParentPolicy::Fallback => write!(f, "fallback"),
            MissingParentPolicy::Skip => write!(f, "skip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Ready to push.
    Ready(Record),
    /// Parent mapping missing under `MissingParentPolicy::Skip`.
    Deferred {
        record: Record,
        parent_type: EntityType,
        parent_local_id: LocalId,
    },
}

/// Rewrites a record's parent reference through the identity map.
///
/// Pure: only the in-memory map is consulted. Must run after the parent
/// type's pass has finished for the current run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver {
    policy: MissingParentPolicy,
}

impl DependencyResolver {
    pub fn new(policy: MissingParentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MissingParentPolicy {
        self.policy
    }

    pub fn rewrite_parent(&self, map: &IdentityMap, mut record: Record) -> Resolution {
        let (Some(parent_type), Some(parent_ref)) =
            (record.entity_type().parent(), record.parent_ref())
        else {
            return Resolution::Ready(record);
        };

        let parent_local_id = match parent_ref {
            ParentRef::Remote(_) => return Resolution::Ready(record),
            ParentRef::Local(id) => id,
        };

        let resolved = map.resolve_or_default(parent_type, parent_local_id);
        if resolved.is_resolved() {
            record.payload = record.payload.with_parent(resolved);
            return Resolution::Ready(record);
        }

        match self.policy {
            MissingParentPolicy::Fallback => {
                tracing::warn!(
                    entity_type = %record.entity_type(),
                    local_id = %record.local_id,
                    parent = %parent_local_id,
                    "Parent has no remote id, pushing raw local reference"
                );
                Resolution::Ready(record)
            }
            MissingParentPolicy::Skip => Resolution::Deferred {
                record,
                parent_type,
                parent_local_id,
            },
        }
    }
}
