//! Sync CLI commands for pushing pending records to the server.

use clap::{Args, Subcommand};
use std::sync::Arc;

use fieldsync::config::{Config, SyncConfig};
use fieldsync::db::SqliteStore;
use fieldsync::models::EntityType;
use fieldsync::sync::{
    channel, ConnectivityGate, ConnectivityProbe, HttpRemoteApi, LocalStore, RemoteError,
    RunStatus, StaticToken, StoreError, SyncError, SyncOrchestrator, SyncSummary,
};

/// Sync with remote server
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show pending records, last sync and server status
    Status,
}

impl SyncCommand {
    pub async fn run(
        &self,
        store: Arc<SqliteStore>,
        config: &Config,
    ) -> Result<(), SyncCommandError> {
        match &self.command {
            None => self.sync(store, config).await,
            Some(SyncSubcommand::Status) => self.status(store, config).await,
        }
    }

    async fn sync(
        &self,
        store: Arc<SqliteStore>,
        config: &Config,
    ) -> Result<(), SyncCommandError> {
        let server_url = server_url(&config.sync)?;
        let probe = ConnectivityProbe::new(
            server_url,
            config.sync.request_timeout(),
            config.sync.probe_interval(),
        )
        .map_err(|e| SyncCommandError::Remote(RemoteError::Unavailable(e.to_string())))?;

        // Check server reachability first (fast fail)
        let (_online_tx, online) = channel(probe.check().await);
        let orchestrator = build_orchestrator(store, &config.sync, online)?;

        println!("Syncing with {}...", server_url);
        println!();

        let summary = orchestrator.trigger_sync().await?;
        print_summary(&summary);
        Ok(())
    }

    async fn status(
        &self,
        store: Arc<SqliteStore>,
        config: &Config,
    ) -> Result<(), SyncCommandError> {
        println!("Sync Status");
        println!("===========");
        println!();

        let mut total = 0;
        for entity_type in EntityType::SYNC_ORDER {
            let pending = store.list_pending(entity_type).await?.len();
            total += pending;
            println!("  {:<12} {} pending", entity_type.label(), pending);
        }
        println!("  {:<12} {} pending", "Total", total);
        println!();

        match store.last_sync_time().await? {
            Some(at) => println!("Last sync: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("Last sync: never"),
        }

        if !config.sync.is_configured() {
            println!();
            println!("Server: not configured");
            println!();
            println!("To enable sync, add to your config file:");
            println!();
            println!("  sync:");
            println!("    server_url: \"http://localhost:8000/api\"");
            println!("    access_token: \"your-token\"");
            println!();
            println!("Or set environment variables:");
            println!("  FIELDSYNC_SERVER_URL");
            println!("  FIELDSYNC_ACCESS_TOKEN");
            return Ok(());
        }

        let server_url = server_url(&config.sync)?;
        println!("Server:    {}", server_url);

        let reachable = match ConnectivityProbe::new(
            server_url,
            config.sync.request_timeout(),
            config.sync.probe_interval(),
        ) {
            Ok(probe) => probe.check().await,
            Err(_) => false,
        };
        println!(
            "Status:    {}",
            if reachable { "✓ reachable" } else { "✗ unreachable" }
        );

        Ok(())
    }
}

/// Keep syncing automatically whenever the server becomes reachable
#[derive(Debug, Args)]
pub struct WatchCommand {}

impl WatchCommand {
    pub async fn run(
        &self,
        store: Arc<SqliteStore>,
        config: &Config,
    ) -> Result<(), SyncCommandError> {
        let server_url = server_url(&config.sync)?;
        let probe = ConnectivityProbe::new(
            server_url,
            config.sync.request_timeout(),
            config.sync.probe_interval(),
        )
        .map_err(|e| SyncCommandError::Remote(RemoteError::Unavailable(e.to_string())))?;

        // Starts offline so the first successful probe triggers a sync
        let (online_tx, online) = channel(false);
        let orchestrator = Arc::new(build_orchestrator(store, &config.sync, online.clone())?);
        let gate = ConnectivityGate::new(orchestrator.clone(), online, config.sync.settle_delay());

        println!(
            "Watching {} ({} record(s) pending). Press Ctrl-C to stop.",
            server_url,
            gate.pending_count().await?
        );

        let gate_task = gate.spawn();
        let probe_task = probe.spawn(online_tx);

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        }

        probe_task.abort();
        gate_task.abort();
        println!("Stopped. {} record(s) pending.", orchestrator.pending_count().await?);
        Ok(())
    }
}

fn server_url(config: &SyncConfig) -> Result<&str, SyncCommandError> {
    config
        .server_url
        .as_deref()
        .ok_or(SyncCommandError::NotConfigured)
}

fn build_orchestrator(
    store: Arc<SqliteStore>,
    config: &SyncConfig,
    online: tokio::sync::watch::Receiver<bool>,
) -> Result<SyncOrchestrator, SyncCommandError> {
    let remote = HttpRemoteApi::new(server_url(config)?, config.request_timeout())?;
    let tokens = StaticToken::new(config.access_token.clone());

    Ok(
        SyncOrchestrator::new(store, Arc::new(remote), Arc::new(tokens), online)
            .with_missing_parent_policy(config.missing_parent),
    )
}

fn print_summary(summary: &SyncSummary) {
    match summary.status {
        RunStatus::Offline => {
            println!("Server unreachable, nothing was sent. Records stay pending.");
            return;
        }
        RunStatus::NoCredentials => {
            println!("No access token configured, nothing was sent.");
            return;
        }
        RunStatus::AlreadyRunning => {
            println!("A sync is already running.");
            return;
        }
        RunStatus::Completed => {}
    }

    if summary.imported > 0 {
        println!("  ↓ imported: {}", summary.imported);
    }
    println!("  ✓ synced:   {}", summary.synced);
    if summary.deferred > 0 {
        println!("  … deferred: {} (parent not synced yet)", summary.deferred);
    }
    if summary.has_failures() {
        println!("  ✗ failed:   {}", summary.failed);
        println!();
        for message in summary.error_messages() {
            println!("    {}", message);
        }
        println!();
        println!("Failed records stay pending and are retried on the next sync.");
    } else {
        println!();
        println!("Sync complete.");
    }
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    NotConfigured,
    Remote(RemoteError),
    Store(StoreError),
    Sync(SyncError),
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::NotConfigured => write!(
                f,
                "Sync not configured. Add server_url and access_token to config."
            ),
            SyncCommandError::Remote(e) => write!(f, "{}", e),
            SyncCommandError::Store(e) => write!(f, "{}", e),
            SyncCommandError::Sync(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::NotConfigured => None,
            SyncCommandError::Remote(e) => Some(e),
            SyncCommandError::Store(e) => Some(e),
            SyncCommandError::Sync(e) => Some(e),
        }
    }
}

impl From<RemoteError> for SyncCommandError {
    fn from(e: RemoteError) -> Self {
        SyncCommandError::Remote(e)
    }
}

impl From<StoreError> for SyncCommandError {
    fn from(e: StoreError) -> Self {
        SyncCommandError::Store(e)
    }
}

impl From<SyncError> for SyncCommandError {
    fn from(e: SyncError) -> Self {
        SyncCommandError::Sync(e)
    }
}
