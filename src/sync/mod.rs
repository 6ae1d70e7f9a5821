//! Offline mutation sync engine.
//!
//! Pushes locally created records to the remote system of record in
//! dependency order (Institution, Visit, Dish, Ingredient), remapping local
//! ids to remote ids as parents are created.
//!
//! # Components
//!
//! - [`IdentityMap`]: local id to remote id, per entity type
//! - [`PendingSet`]: records still waiting to be pushed
//! - [`DuplicateGuard`]: drops repeated local records
//! - [`DependencyResolver`]: rewrites parent references before a push
//! - [`RemoteImporter`]: copies institutions and visits already on the
//!   server into the local store
//! - [`RemoteUpserter`]: one create call, with natural-key conflict
//!   reconciliation
//! - [`SyncOrchestrator`]: runs the whole sweep, one run at a time
//! - [`ConnectivityGate`]: automatic runs on reconnection

mod connectivity;
mod credentials;
mod dedupe;
mod error;
mod identity_map;
mod importer;
mod orchestrator;
mod pending;
pub mod remote;
mod resolver;
mod store;
mod upserter;

pub use connectivity::{channel, ConnectivityGate, ConnectivityProbe};
pub use credentials::{StaticToken, TokenSource};
pub use dedupe::DuplicateGuard;
pub use error::{
    IdentityConflict, ItemFailure, RemoteError, StoreError, SyncError, SyncItemError,
};
pub use identity_map::{IdentityMap, PutOutcome};
pub use importer::{RemoteImporter, IMPORTED_TYPES};
pub use orchestrator::{RunState, RunStatus, SyncOrchestrator, SyncSummary};
pub use pending::PendingSet;
pub use remote::{HttpRemoteApi, RemoteApi};
pub use resolver::{DependencyResolver, MissingParentPolicy, Resolution};
pub use store::LocalStore;
pub use upserter::RemoteUpserter;
