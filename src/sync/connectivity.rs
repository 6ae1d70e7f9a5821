//! Connectivity tracking and automatic sync on reconnection.
//!
//! Online state travels over a `watch` channel: the probe (or any other
//! monitor) publishes into the sender, the gate and the orchestrator read
//! from receivers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::error::StoreError;
use super::orchestrator::SyncOrchestrator;

/// Creates the online/offline channel, starting at `initial`.
pub fn channel(initial: bool) -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(initial)
}

/// Starts sync runs when connectivity comes back.
pub struct ConnectivityGate {
    orchestrator: Arc<SyncOrchestrator>,
    online: watch::Receiver<bool>,
    settle_delay: Duration,
}

impl ConnectivityGate {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        online: watch::Receiver<bool>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            orchestrator,
            online,
            settle_delay,
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Pending records across every entity type.
    pub async fn pending_count(&self) -> Result<usize, StoreError> {
        self.orchestrator.pending_count().await
    }

    /// Watches for offline-to-online transitions until the sender is dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut was_online = *self.online.borrow_and_update();

        while self.online.changed().await.is_ok() {
            let now_online = *self.online.borrow_and_update();
            if now_online && !was_online {
                tracing::info!("Connectivity restored");
                self.sync_after_settle().await;
                // Any change seen during the settle or the run means the link
                // may have dropped; treat the latest value as a fresh transition
                if self.online.has_changed().unwrap_or(false) {
                    was_online = false;
                    continue;
                }
            } else if !now_online && was_online {
                tracing::info!("Connectivity lost");
            }
            was_online = now_online;
        }

        tracing::debug!("Connectivity monitor closed, gate stopping");
    }

    /// Waits out flapping connections before starting a run.
    async fn sync_after_settle(&self) {
        tokio::time::sleep(self.settle_delay).await;
        if !*self.online.borrow() {
            tracing::debug!("Went offline again while settling, not syncing");
            return;
        }

        match self.orchestrator.trigger_sync().await {
            Ok(summary) if summary.has_failures() => {
                tracing::warn!(
                    synced = summary.synced,
                    failed = summary.failed,
                    "Automatic sync finished with failures"
                );
            }
            Ok(summary) => {
                tracing::info!(
                    synced = summary.synced,
                    status = ?summary.status,
                    "Automatic sync finished"
                );
            }
            Err(e) => tracing::warn!("Automatic sync failed: {}", e),
        }
    }
}

/// Publishes server reachability by polling a health URL.
///
/// Any HTTP response, whatever its status, counts as online.
pub struct ConnectivityProbe {
    client: reqwest::Client,
    url: String,
    interval: Duration,
}

impl ConnectivityProbe {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/health", base_url.trim_end_matches('/')),
            interval,
        })
    }

    pub async fn check(&self) -> bool {
        self.client.get(&self.url).send().await.is_ok()
    }

    /// Polls until every receiver is gone. Only changes are published.
    pub fn spawn(self, online: watch::Sender<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            while !online.is_closed() {
                ticker.tick().await;
                let reachable = self.check().await;
                online.send_if_modified(|current| {
                    if *current == reachable {
                        false
                    } else {
                        *current = reachable;
                        true
                    }
                });
            }
        })
    }
}
