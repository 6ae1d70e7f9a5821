use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{EntityType, ParentRef, Payload};

/// Identifier assigned when a record is created offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub i64);

impl LocalId {
    /// Timestamp-derived id (milliseconds), strictly greater than `previous`
    /// unless `previous` is already `i64::MAX`, which is returned as-is.
    pub fn generate(previous: Option<LocalId>) -> Self {
        let now = Utc::now().timestamp_millis();
        match previous {
            Some(LocalId(prev)) if prev >= now => LocalId(prev.saturating_add(1)),
            _ => LocalId(now),
        }
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned by the remote system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub i64);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Pending,
    Synced,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Pending => write!(f, "pending"),
            SyncState::Synced => write!(f, "synced"),
        }
    }
}

impl FromStr for SyncState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncState::Pending),
            "synced" => Ok(SyncState::Synced),
            _ => Err(format!("Invalid sync state '{}'", s)),
        }
    }
}

/// A locally stored entity together with its sync bookkeeping.
///
/// `remote_id` is only set once `sync_state` is `Synced`; `mark_synced` is the
/// one place that transition happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub local_id: LocalId,
    pub remote_id: Option<RemoteId>,
    pub sync_state: SyncState,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn new(local_id: LocalId, payload: impl Into<Payload>) -> Self {
        Self {
            local_id,
            remote_id: None,
            sync_state: SyncState::Pending,
            payload: payload.into(),
            created_at: Utc::now(),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.payload.entity_type()
    }

    pub fn parent_ref(&self) -> Option<ParentRef> {
        self.payload.parent_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.sync_state == SyncState::Pending
    }

    pub fn mark_synced(&mut self, remote_id: RemoteId) {
        self.remote_id = Some(remote_id);
        self.sync_state = SyncState::Synced;
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}]",
            self.entity_type().label(),
            self.local_id,
            self.sync_state
        )?;
        if let Some(remote_id) = self.remote_id {
            write!(f, " -> {}", remote_id)?;
        }
        write!(f, ": {}", self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Institution;

    #[test]
    fn test_local_id_generate_is_monotonic() {
        let first = LocalId::generate(None);
        let second = LocalId::generate(Some(first));
        let far_future = LocalId(i64::MAX - 1);
        assert!(second > first);
        assert_eq!(LocalId::generate(Some(far_future)), LocalId(i64::MAX));
    }

    #[test]
    fn test_local_id_generate_saturates_at_max() {
        let max = LocalId(i64::MAX);
        assert_eq!(LocalId::generate(Some(max)), max);
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = Record::new(LocalId(1), Institution::new("ESC001", "Escuela 1", "escuela"));
        assert!(record.is_pending());
        assert_eq!(record.remote_id, None);
        assert_eq!(record.entity_type(), EntityType::Institution);
        assert_eq!(record.parent_ref(), None);
    }

    #[test]
    fn test_mark_synced_sets_remote_id() {
        let mut record =
            Record::new(LocalId(1), Institution::new("ESC001", "Escuela 1", "escuela"));
        record.mark_synced(RemoteId(501));
        assert_eq!(record.sync_state, SyncState::Synced);
        assert_eq!(record.remote_id, Some(RemoteId(501)));
    }

    #[test]
    fn test_sync_state_from_str() {
        assert_eq!(SyncState::from_str("pending").unwrap(), SyncState::Pending);
        assert_eq!(SyncState::from_str("synced").unwrap(), SyncState::Synced);
        assert!(SyncState::from_str("dirty").is_err());
    }
}
