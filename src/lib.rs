//! Offline-first field audit records with a dependency-ordered sync engine.
//!
//! Records (institutions, visits, dishes, ingredients) are created locally
//! without a server and pushed later by [`sync::SyncOrchestrator`].

pub mod config;
pub mod db;
pub mod models;
pub mod server;
pub mod sync;
