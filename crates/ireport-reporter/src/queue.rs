//! Offline capture queue.
//!
//! Persists incident submissions that cannot reach the cloud and replays
//! them when connectivity returns. Items process strictly sequentially:
//! concurrent replays could double-upload media for the same queued item,
//! and a reporter's submissions must keep their order.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use ireport_core::cloud::{
    CloudBackend, CloudHistoryEntry, CloudIncident, NewIncident, StationAssignment,
};
use ireport_core::db::{
    OfflineQueueRepository, SqliteOfflineQueueRepository, MAX_SUBMISSION_RETRIES,
};
use ireport_core::models::{IncidentStatus, QueuedSubmission, SubmissionId, SubmissionPayload};
use ireport_core::services::DatabaseService;
use ireport_core::storage::BlobStorage;
use ireport_core::util::now_ms;
use ireport_core::{Error, Result};

/// Outcome of one replay pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Items whose incident record insert succeeded
    pub successful: usize,
    /// Items skipped at the retry ceiling or failed this pass
    pub failed: usize,
}

/// Receives per-item replay notifications.
pub trait ReplayObserver: Send + Sync {
    /// Called before each item, 1-based
    fn on_progress(&self, _current: usize, _total: usize) {}

    /// The item's incident record was created and the item removed
    fn on_item_synced(&self, _id: &SubmissionId) {}

    /// The item failed this pass and stays queued
    fn on_item_failed(&self, _id: &SubmissionId, _error: &Error) {}
}

/// Observer that ignores every notification.
pub struct NoopObserver;

impl ReplayObserver for NoopObserver {}

/// Durable queue of not-yet-submitted incident reports.
pub struct OfflineQueue {
    db: DatabaseService,
    backend: Arc<dyn CloudBackend>,
    storage: Arc<dyn BlobStorage>,
    replay_guard: tokio::sync::Mutex<()>,
}

impl OfflineQueue {
    /// Create a queue over the reporter's store and cloud collaborators.
    pub fn new(
        db: DatabaseService,
        backend: Arc<dyn CloudBackend>,
        storage: Arc<dyn BlobStorage>,
    ) -> Self {
        Self {
            db,
            backend,
            storage,
            replay_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Persist a submission for later replay.
    ///
    /// Returns immediately; never blocks on network I/O.
    pub async fn enqueue(&self, payload: &SubmissionPayload) -> Result<QueuedSubmission> {
        let db = self.db.lock().await;
        let item = SqliteOfflineQueueRepository::new(db.connection()).enqueue(payload)?;
        tracing::info!("Queued offline submission {}", item.id);
        Ok(item)
    }

    /// Number of submissions awaiting replay.
    pub async fn pending_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteOfflineQueueRepository::new(db.connection()).count()
    }

    /// Submissions at the retry ceiling, surfaced to the UI instead of
    /// silently dropped.
    pub async fn exhausted(&self) -> Result<Vec<QueuedSubmission>> {
        let db = self.db.lock().await;
        SqliteOfflineQueueRepository::new(db.connection()).exhausted()
    }

    /// Reset retry counters at the user's explicit request, making
    /// exhausted items eligible for replay again.
    pub async fn reset_retries(&self) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteOfflineQueueRepository::new(db.connection()).reset_retries()
    }

    /// Replay every queued submission, strictly sequentially and in FIFO
    /// order.
    ///
    /// Returns `None` when another replay pass is already running. Items at
    /// the retry ceiling are skipped (counted as failed) but stay queued. A
    /// queue item is removed only after its incident record insert succeeds.
    pub async fn replay_all(&self, observer: &dyn ReplayObserver) -> Result<Option<ReplayReport>> {
        let Ok(_guard) = self.replay_guard.try_lock() else {
            tracing::debug!("Replay already running, skipping trigger");
            return Ok(None);
        };

        let items = {
            let db = self.db.lock().await;
            SqliteOfflineQueueRepository::new(db.connection()).all()?
        };

        let total = items.len();
        let mut report = ReplayReport::default();

        for (index, item) in items.iter().enumerate() {
            observer.on_progress(index + 1, total);

            if item.retry_count >= MAX_SUBMISSION_RETRIES {
                tracing::debug!("Skipping submission {}: retry ceiling reached", item.id);
                report.failed += 1;
                continue;
            }

            match self.deliver(item).await {
                Ok(incident) => {
                    // Best-effort; an assignment failure never fails the item
                    if let Err(error) = self.assign_nearest_station(&incident).await {
                        tracing::warn!(
                            "Auto-assignment failed for incident {}: {error}",
                            incident.id
                        );
                    }

                    let db = self.db.lock().await;
                    SqliteOfflineQueueRepository::new(db.connection()).remove(&item.id)?;
                    drop(db);

                    observer.on_item_synced(&item.id);
                    report.successful += 1;
                }
                Err(error) => {
                    tracing::warn!("Failed to replay submission {}: {error}", item.id);
                    let db = self.db.lock().await;
                    SqliteOfflineQueueRepository::new(db.connection())
                        .increment_retry(&item.id)?;
                    drop(db);

                    observer.on_item_failed(&item.id, &error);
                    report.failed += 1;
                }
            }
        }

        Ok(Some(report))
    }

    /// Replay only when the queue is non-empty (the app-start trigger).
    pub async fn replay_if_pending(
        &self,
        observer: &dyn ReplayObserver,
    ) -> Result<Option<ReplayReport>> {
        if self.pending_count().await? == 0 {
            return Ok(None);
        }
        self.replay_all(observer).await
    }

    /// Replay the queue on every offline-to-online transition.
    ///
    /// Connectivity is a trigger only, never a correctness guarantee — a
    /// replay can still fail after the watcher reports online.
    pub fn watch_connectivity(self: Arc<Self>, mut rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                if !*rx.borrow_and_update() {
                    continue;
                }
                match self.replay_if_pending(&NoopObserver).await {
                    Ok(Some(report)) => tracing::info!(
                        "Connectivity restored; replayed queue: {} ok, {} failed",
                        report.successful,
                        report.failed
                    ),
                    Ok(None) => {}
                    Err(error) => tracing::warn!("Queue replay failed: {error}"),
                }
            }
        })
    }

    /// Upload the item's media and create its incident record.
    ///
    /// An upload failure aborts only this item; siblings uploaded earlier in
    /// the same item are left in place (a known orphaned-blob gap — replay
    /// uploads them again on the next attempt).
    pub(crate) async fn deliver(&self, item: &QueuedSubmission) -> Result<CloudIncident> {
        let mut media_urls = Vec::with_capacity(item.payload.media_paths.len());
        for path in &item.payload.media_paths {
            let bytes = std::fs::read(path)?;
            let content_type = mime_guess::from_path(path).first_or_octet_stream();
            let url = self
                .storage
                .upload(&object_key_for(path), &bytes, content_type.as_ref())
                .await?;
            media_urls.push(url);
        }

        let record = NewIncident {
            agency_type: item.payload.agency_type,
            reporter_id: item.payload.reporter_id.clone(),
            reporter_name: item.payload.reporter_name.clone(),
            reporter_age: item.payload.reporter_age,
            description: item.payload.description.clone(),
            status: IncidentStatus::Pending,
            latitude: item.payload.latitude,
            longitude: item.payload.longitude,
            address: item.payload.address.clone(),
            media_urls,
            created_at: item.created_at,
        };
        self.backend.insert_incident(&record).await
    }

    /// Route the new incident to the closest responder station.
    pub(crate) async fn assign_nearest_station(
        &self,
        incident: &CloudIncident,
    ) -> Result<Option<StationAssignment>> {
        let Some(station) = self
            .backend
            .find_nearest_station(incident.latitude, incident.longitude, incident.agency_type)
            .await?
        else {
            return Ok(None);
        };

        self.backend
            .assign_station(&incident.id, station.station_id)
            .await?;

        let notes = station.distance_km.map_or_else(
            || format!("Auto-assigned to {}", station.station_name),
            |distance| {
                format!(
                    "Auto-assigned to {} ({distance:.2} km away)",
                    station.station_name
                )
            },
        );
        self.backend
            .insert_status_history(&CloudHistoryEntry {
                incident_id: incident.id,
                status: IncidentStatus::Assigned,
                notes,
                changed_by: "System".to_string(),
                changed_at: now_ms(),
            })
            .await?;

        tracing::info!(
            "Auto-assigned incident {} to station {}",
            incident.id,
            station.station_name
        );
        Ok(Some(station))
    }
}

/// Namespaced object key for one media file; the extension survives, the
/// rest of the name does not.
fn object_key_for(path: &str) -> String {
    let extension = Path::new(path)
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or("jpg");
    format!("incidents/{}.{extension}", uuid::Uuid::now_v7())
}
