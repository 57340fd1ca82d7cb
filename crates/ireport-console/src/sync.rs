//! Sync manager for the review console.
//!
//! Orchestrates the pull, push, and history-reconciliation steps of a sync
//! pass. Passes run on a fixed timer and on demand, serialized by the
//! `syncing` guard; a trigger arriving mid-pass is a no-op.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use ireport_core::cloud::{CloudBackend, CloudHistoryEntry, IncidentPatch};
use ireport_core::db::{
    FailureDisposition, IncidentMirrorRepository, OutboundChangeRepository,
    SqliteIncidentMirrorRepository, SqliteOutboundChangeRepository, SqliteStatusHistoryRepository,
    SqliteSyncMetaRepository, StatusHistoryRepository, SyncMetaRepository, MAX_PUSH_ATTEMPTS,
};
use ireport_core::models::{ChangeAction, IncidentId};
use ireport_core::services::DatabaseService;
use ireport_core::util::now_ms;
use ireport_core::Result;

use crate::realtime::RealtimeMerger;
use crate::status::{ObserverRegistry, StatusCell, SyncObserver, SyncStatus};

/// Fixed interval between timer-driven passes
pub const SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Oldest outbound changes considered per push step
const PUSH_BATCH_SIZE: usize = 50;

/// How a [`SyncManager::sync_now`] call resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A full pass ran
    Completed,
    /// Another pass was already running; this trigger was a no-op
    SkippedBusy,
}

/// Orchestrates pull-from-cloud, push-to-cloud, and history reconciliation.
pub struct SyncManager {
    db: DatabaseService,
    backend: Arc<dyn CloudBackend>,
    state: Arc<StatusCell>,
    observers: Arc<ObserverRegistry>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SyncManager {
    /// Create a manager over the console's store and cloud backend.
    #[must_use]
    pub fn new(db: DatabaseService, backend: Arc<dyn CloudBackend>) -> Self {
        Self {
            db,
            backend,
            state: Arc::new(StatusCell::default()),
            observers: Arc::new(ObserverRegistry::default()),
            timer: Mutex::new(None),
        }
    }

    /// Register an observer for status and incident notifications.
    pub fn register_observer(&self, observer: Arc<dyn SyncObserver>) {
        self.observers.register(observer);
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.state.snapshot()
    }

    /// Build the realtime merge handler sharing this manager's state and
    /// observer list.
    #[must_use]
    pub fn realtime(&self) -> RealtimeMerger {
        RealtimeMerger::new(
            self.db.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.observers),
        )
    }

    /// Start the periodic sync timer. The first pass runs immediately.
    pub fn start(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SYNC_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(error) = manager.sync_now().await {
                    tracing::warn!("Scheduled sync pass failed: {error}");
                }
            }
        });

        let mut timer = self.timer.lock().expect("timer lock poisoned");
        if let Some(previous) = timer.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the periodic sync timer.
    pub fn stop(&self) {
        if let Some(handle) = self.timer.lock().expect("timer lock poisoned").take() {
            handle.abort();
        }
    }

    /// Run one sync pass now.
    ///
    /// Returns [`SyncOutcome::SkippedBusy`] without doing anything when a
    /// pass is already in flight.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        if !self.state.begin_pass() {
            tracing::debug!("Sync already running, skipping trigger");
            return Ok(SyncOutcome::SkippedBusy);
        }
        self.observers.notify_status(&self.state.snapshot());

        let result = self.run_pass().await;
        match &result {
            Ok(()) => {
                self.state.set_connected(true);
                self.state.set_last_sync(now_ms());
            }
            Err(error) => {
                tracing::warn!("Sync pass failed: {error}");
                self.state.set_connected(false);
            }
        }

        if let Err(error) = self.refresh_counts().await {
            tracing::warn!("Failed to refresh queue counts: {error}");
        }
        self.state.end_pass();
        self.observers.notify_status(&self.state.snapshot());

        result.map(|()| SyncOutcome::Completed)
    }

    async fn run_pass(&self) -> Result<()> {
        tracing::debug!("Sync pass: pulling");
        self.pull().await?;
        tracing::debug!("Sync pass: pushing");
        self.push().await?;
        tracing::debug!("Sync pass: reconciling history");
        self.reconcile_history().await?;
        Ok(())
    }

    /// Merge cloud incidents newer than the watermark into the mirror.
    async fn pull(&self) -> Result<()> {
        let watermark = {
            let db = self.db.lock().await;
            SqliteSyncMetaRepository::new(db.connection()).last_pull()?
        };

        let records = self.backend.fetch_incidents_since(watermark).await?;
        if !records.is_empty() {
            tracing::debug!("Pulled {} incidents since {watermark}", records.len());
        }

        let db = self.db.lock().await;
        let mirror = SqliteIncidentMirrorRepository::new(db.connection());
        for record in &records {
            mirror.merge_cloud(record)?;
        }
        // Advance only after the whole batch merged
        SqliteSyncMetaRepository::new(db.connection()).set_last_pull(now_ms())?;
        Ok(())
    }

    /// Push queued local edits, dropping any the cloud has since outrun.
    async fn push(&self) -> Result<()> {
        let items = {
            let db = self.db.lock().await;
            SqliteOutboundChangeRepository::new(db.connection()).oldest(PUSH_BATCH_SIZE)?
        };

        for item in items {
            if item.table_name != "incidents" || item.action != ChangeAction::Update {
                // Nothing else produces queue rows today; clear strays
                tracing::debug!(
                    "Discarding unsupported queued change {}/{}",
                    item.table_name,
                    item.action
                );
                let db = self.db.lock().await;
                SqliteOutboundChangeRepository::new(db.connection()).delete(item.id)?;
                continue;
            }

            let Ok(id) = item.record_id.parse::<IncidentId>() else {
                let db = self.db.lock().await;
                SqliteOutboundChangeRepository::new(db.connection()).delete(item.id)?;
                continue;
            };

            let local = {
                let db = self.db.lock().await;
                SqliteIncidentMirrorRepository::new(db.connection()).get(&id)?
            };
            let Some(local) = local else {
                let db = self.db.lock().await;
                SqliteOutboundChangeRepository::new(db.connection()).delete(item.id)?;
                continue;
            };

            // Conflict check: the cloud arbitrates. A strictly newer cloud
            // timestamp means this edit lost; the next pull brings the cloud
            // version down.
            match self.backend.fetch_updated_at(&id).await {
                Ok(Some(cloud_updated_at)) if cloud_updated_at > local.updated_at => {
                    tracing::info!(
                        "Conflict on incident {id}: cloud is newer, dropping queued update"
                    );
                    let db = self.db.lock().await;
                    SqliteOutboundChangeRepository::new(db.connection()).delete(item.id)?;
                    continue;
                }
                Ok(_) => {}
                Err(error) => {
                    self.record_push_failure(item.id, &error.to_string()).await?;
                    continue;
                }
            }

            let patch = IncidentPatch {
                status: local.status,
                updated_at: local.updated_at,
                updated_by: local.updated_by.clone(),
            };
            match self.backend.update_incident(&id, &patch).await {
                Ok(()) => {
                    let db = self.db.lock().await;
                    SqliteOutboundChangeRepository::new(db.connection()).delete(item.id)?;
                    SqliteIncidentMirrorRepository::new(db.connection()).mark_synced(&id)?;
                }
                Err(error) => {
                    self.record_push_failure(item.id, &error.to_string()).await?;
                }
            }
        }

        Ok(())
    }

    async fn record_push_failure(&self, item_id: i64, error: &str) -> Result<()> {
        let db = self.db.lock().await;
        let disposition =
            SqliteOutboundChangeRepository::new(db.connection()).record_failure(item_id, error)?;
        match disposition {
            FailureDisposition::Retained { attempts } => {
                tracing::warn!("Push attempt {attempts} failed for change {item_id}: {error}");
            }
            FailureDisposition::DeadLettered => {
                tracing::warn!(
                    "Change {item_id} dead-lettered after {MAX_PUSH_ATTEMPTS} attempts: {error}"
                );
            }
        }
        Ok(())
    }

    /// Push un-synced history entries, oldest first. Failures retry on the
    /// next pass indefinitely.
    async fn reconcile_history(&self) -> Result<()> {
        let entries = {
            let db = self.db.lock().await;
            SqliteStatusHistoryRepository::new(db.connection()).unsynced()?
        };

        for entry in entries {
            let payload = CloudHistoryEntry {
                incident_id: entry.incident_id,
                status: entry.status,
                notes: entry.notes.clone(),
                changed_by: entry.changed_by.clone(),
                changed_at: entry.changed_at,
            };
            match self.backend.insert_status_history(&payload).await {
                Ok(()) => {
                    let db = self.db.lock().await;
                    SqliteStatusHistoryRepository::new(db.connection()).mark_synced(entry.id)?;
                }
                Err(error) => {
                    tracing::warn!("Failed to sync history entry {}: {error}", entry.id);
                }
            }
        }

        Ok(())
    }

    async fn refresh_counts(&self) -> Result<()> {
        let db = self.db.lock().await;
        let queue = SqliteOutboundChangeRepository::new(db.connection());
        self.state
            .set_counts(queue.count()?, queue.dead_letter_count()?);
        Ok(())
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.lock().ok().and_then(|mut timer| timer.take()) {
            handle.abort();
        }
    }
}
