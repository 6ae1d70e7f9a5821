//! Reference implementation of the audit REST backend.
//!
//! Keeps everything in memory. Used by `fieldsync-server` for local
//! development and by the HTTP client tests.

pub mod api;
pub mod storage;

pub use api::{router, AppState, DEFAULT_PAGE_SIZE};
pub use storage::{AuditStore, FieldErrors};
