//! Sync error types.
//!
//! Failures are split by blast radius: `SyncItemError` is scoped to a single
//! record and never aborts a run, while `SyncError` ends the run it occurred
//! in.

use thiserror::Error;

use crate::models::{EntityType, LocalId, RemoteId};

/// Failure reported by the remote API for a single request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// Uniqueness violation on a natural key (e.g. institution code).
    #[error("{field} '{value}' already exists")]
    Conflict { field: String, value: String },

    /// Validation failure or any other non-retryable client error.
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Credentials were refused.
    #[error("unauthorized")]
    Unauthorized,

    /// Server error or unreachable backend. Expected to succeed on retry.
    #[error("server unavailable: {0}")]
    Unavailable(String),

    #[error("timeout")]
    Timeout,

    /// The server answered 2xx but the body could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl RemoteError {
    /// True for failures expected to clear up without changing the record.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_) | RemoteError::Timeout)
    }
}

/// Failure of the local durable store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt {entity_type} record {local_id}: {reason}")]
    Corrupt {
        entity_type: String,
        local_id: i64,
        reason: String,
    },
}

/// An identity-map entry would be overwritten with a different remote id.
///
/// Indicates a local invariant violation; never expected in correct operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{entity_type} {local_id} already maps to {existing}, refusing {attempted}")]
pub struct IdentityConflict {
    pub entity_type: EntityType,
    pub local_id: LocalId,
    pub existing: RemoteId,
    pub attempted: RemoteId,
}

/// Why one record could not be synced during a run.
#[derive(Error, Debug)]
pub enum ItemFailure {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("identity map conflict: {0}")]
    IdentityMapConflict(#[from] IdentityConflict),

    #[error("storage: {0}")]
    Storage(#[from] StoreError),
}

/// Per-record failure, collected into the run summary.
#[derive(Error, Debug)]
#[error("{} {local_id}: {failure}", .entity_type.label())]
pub struct SyncItemError {
    pub entity_type: EntityType,
    pub local_id: LocalId,
    pub failure: ItemFailure,
}

impl SyncItemError {
    pub fn new(
        entity_type: EntityType,
        local_id: LocalId,
        failure: impl Into<ItemFailure>,
    ) -> Self {
        Self {
            entity_type,
            local_id,
            failure: failure.into(),
        }
    }

    /// Whether the record is expected to go through on the next run as-is.
    pub fn is_transient(&self) -> bool {
        matches!(&self.failure, ItemFailure::Remote(e) if e.is_transient())
    }
}

/// Failure that ends a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("local store unavailable: {0}")]
    Store(#[from] StoreError),
}
