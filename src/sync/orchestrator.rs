//! Top-level sync driver.
//!
//! A run first imports what the server already holds, then walks the entity
//! types root-to-leaf, pushing each type's pending records before the next
//! type starts, so a child never looks up a parent mapping that could still
//! appear later in the same run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::credentials::TokenSource;
use super::dedupe::DuplicateGuard;
use super::error::{ItemFailure, StoreError, SyncError, SyncItemError};
use super::identity_map::IdentityMap;
use super::importer::RemoteImporter;
use super::pending::PendingSet;
use super::remote::RemoteApi;
use super::resolver::{DependencyResolver, MissingParentPolicy, Resolution};
use super::store::LocalStore;
use super::upserter::RemoteUpserter;
use crate::models::{EntityType, Record, RemoteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// How a `trigger_sync` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Full sweep over every entity type.
    Completed,
    /// Another run was in flight; nothing was done.
    AlreadyRunning,
    /// No connectivity; the store was not touched.
    Offline,
    /// No access token available yet.
    NoCredentials,
}

/// Result of one `trigger_sync` call.
#[derive(Debug)]
pub struct SyncSummary {
    pub status: RunStatus,
    pub synced: usize,
    /// Remote records copied into the local store before pushing.
    pub imported: usize,
    pub failed: usize,
    /// Children left Pending because their parent had no remote id.
    pub deferred: usize,
    pub errors: Vec<SyncItemError>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncSummary {
    fn new(status: RunStatus) -> Self {
        Self {
            status,
            synced: 0,
            imported: 0,
            failed: 0,
            deferred: 0,
            errors: Vec::new(),
            finished_at: None,
        }
    }

    fn record_failure(&mut self, error: SyncItemError) {
        self.failed += 1;
        self.errors.push(error);
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives sync runs. Construct one per process and share it by `Arc`.
pub struct SyncOrchestrator {
    store: Arc<dyn LocalStore>,
    pending: PendingSet,
    importer: RemoteImporter,
    upserter: RemoteUpserter,
    resolver: DependencyResolver,
    tokens: Arc<dyn TokenSource>,
    online: watch::Receiver<bool>,
    running: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteApi>,
        tokens: Arc<dyn TokenSource>,
        online: watch::Receiver<bool>,
    ) -> Self {
        Self {
            pending: PendingSet::new(store.clone()),
            importer: RemoteImporter::new(remote.clone(), store.clone()),
            store,
            upserter: RemoteUpserter::new(remote),
            resolver: DependencyResolver::default(),
            tokens,
            online,
            running: AtomicBool::new(false),
        }
    }

    pub fn with_missing_parent_policy(mut self, policy: MissingParentPolicy) -> Self {
        self.resolver = DependencyResolver::new(policy);
        self
    }

    pub fn state(&self) -> RunState {
        if self.running.load(Ordering::Acquire) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub async fn pending_count(&self) -> Result<usize, StoreError> {
        self.pending.count().await
    }

    pub async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.store.last_sync_time().await
    }

    /// Runs one sync unless one is already in flight.
    ///
    /// Per-record failures are collected in the summary and never abort the
    /// sweep. Only a failure of the local store itself is returned as an
    /// error.
    pub async fn trigger_sync(&self) -> Result<SyncSummary, SyncError> {
        let Some(_guard) = self.try_begin() else {
            tracing::debug!("Sync already running, ignoring trigger");
            return Ok(SyncSummary::new(RunStatus::AlreadyRunning));
        };

        if !self.is_online() {
            tracing::info!("Offline, skipping sync");
            return Ok(SyncSummary::new(RunStatus::Offline));
        }

        let Some(token) = self.tokens.access_token() else {
            tracing::info!("No access token, skipping sync");
            return Ok(SyncSummary::new(RunStatus::NoCredentials));
        };

        let outcome = self.sweep(&token).await;

        // Stamped whatever the outcome of the sweep
        let finished_at = Utc::now();
        if let Err(e) = self.store.set_last_sync_time(finished_at).await {
            tracing::warn!("Failed to persist last sync time: {}", e);
        }

        let mut summary = outcome?;
        summary.finished_at = Some(finished_at);
        tracing::info!(
            synced = summary.synced,
            imported = summary.imported,
            failed = summary.failed,
            deferred = summary.deferred,
            "Sync run finished"
        );
        Ok(summary)
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    async fn sweep(&self, token: &str) -> Result<SyncSummary, SyncError> {
        let mut map = IdentityMap::from_entries(self.store.load_identity_map().await?);
        tracing::debug!(
            mappings = map.len(),
            missing_parent = %self.resolver.policy(),
            "Starting sweep"
        );
        let mut summary = SyncSummary::new(RunStatus::Completed);
        summary.imported = self.importer.import(token, &mut map).await?;

        for entity_type in EntityType::SYNC_ORDER {
            let records = DuplicateGuard::dedupe(self.pending.select(entity_type).await?);
            if records.is_empty() {
                continue;
            }

            tracing::info!(%entity_type, count = records.len(), "Pushing pending records");
            for record in records {
                self.sync_record(token, &mut map, record, &mut summary).await;
            }
        }

        Ok(summary)
    }

    /// Pushes one record. Any failure is recorded in `summary` and leaves the
    /// record Pending.
    async fn sync_record(
        &self,
        token: &str,
        map: &mut IdentityMap,
        record: Record,
        summary: &mut SyncSummary,
    ) {
        let entity_type = record.entity_type();
        let local_id = record.local_id;

        // Pushed by an earlier run that ended before marking it Synced
        if let Some(remote_id) = map.resolve(entity_type, local_id) {
            tracing::debug!(%entity_type, %local_id, %remote_id, "Already mapped, skipping push");
            self.confirm(entity_type, &record, remote_id, summary).await;
            return;
        }

        let record = match self.resolver.rewrite_parent(map, record) {
            Resolution::Ready(record) => record,
            Resolution::Deferred {
                parent_type,
                parent_local_id,
                ..
            } => {
                tracing::info!(
                    %entity_type,
                    %local_id,
                    %parent_type,
                    parent = %parent_local_id,
                    "Parent not synced yet, deferring"
                );
                summary.deferred += 1;
                return;
            }
        };

        let remote_id = match self.upserter.create(token, &record).await {
            Ok(remote_id) => remote_id,
            Err(e) => {
                tracing::warn!("Sync failed: {}", e);
                summary.record_failure(e);
                return;
            }
        };

        // Children only see the mapping once it is durable
        if let Err(e) = self.store.save_identity(entity_type, local_id, remote_id).await {
            tracing::warn!(%entity_type, %local_id, "Failed to persist identity: {}", e);
            summary.record_failure(SyncItemError::new(entity_type, local_id, e));
            return;
        }
        // Unmapped before the push, checked above
        if let Err(conflict) = map.put(entity_type, local_id, remote_id) {
            tracing::error!("Identity map conflict: {}", conflict);
            summary.record_failure(SyncItemError::new(
                entity_type,
                local_id,
                ItemFailure::IdentityMapConflict(conflict),
            ));
            return;
        }

        self.confirm(entity_type, &record, remote_id, summary).await;
    }

    async fn confirm(
        &self,
        entity_type: EntityType,
        record: &Record,
        remote_id: RemoteId,
        summary: &mut SyncSummary,
    ) {
        match self
            .store
            .mark_synced(entity_type, record.local_id, remote_id)
            .await
        {
            Ok(()) => {
                tracing::debug!(%entity_type, local_id = %record.local_id, %remote_id, "Synced");
                summary.synced += 1;
            }
            Err(e) => {
                tracing::warn!(
                    %entity_type,
                    local_id = %record.local_id,
                    "Failed to mark synced: {}",
                    e
                );
                summary.record_failure(SyncItemError::new(entity_type, record.local_id, e));
            }
        }
    }
}
