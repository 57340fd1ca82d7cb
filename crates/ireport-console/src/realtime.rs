//! Realtime merge handler.
//!
//! Consumes the cloud's live incident change feed and merges each event into
//! the local mirror using the same conflict rule as the pull pass. Merges run
//! independently of the sync pass guard — a per-record merge is a short,
//! idempotent operation, not a multi-step pass. Reconnection belongs to the
//! underlying transport and is never retried here.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ireport_core::cloud::CloudIncident;
use ireport_core::db::{IncidentMirrorRepository, MergeOutcome, SqliteIncidentMirrorRepository};
use ireport_core::services::DatabaseService;
use ireport_core::Result;

use crate::status::{ObserverRegistry, StatusCell};

/// One event from the live change feed transport.
#[derive(Debug)]
pub enum FeedEvent {
    /// An incident row was inserted or updated in the cloud
    Change(CloudIncident),
    /// The transport's subscription state changed
    Connection(bool),
}

/// Applies live cloud changes to the local mirror.
pub struct RealtimeMerger {
    db: DatabaseService,
    state: Arc<StatusCell>,
    observers: Arc<ObserverRegistry>,
}

impl RealtimeMerger {
    pub(crate) fn new(
        db: DatabaseService,
        state: Arc<StatusCell>,
        observers: Arc<ObserverRegistry>,
    ) -> Self {
        Self {
            db,
            state,
            observers,
        }
    }

    /// Merge one incoming cloud record through the shared conflict rule.
    ///
    /// Observers get an incident-updated notification when the record was
    /// applied; skipped records (an un-synced local edit was newer) notify
    /// nobody.
    pub async fn apply(&self, record: &CloudIncident) -> Result<MergeOutcome> {
        let (outcome, incident) = {
            let db = self.db.lock().await;
            let mirror = SqliteIncidentMirrorRepository::new(db.connection());
            let outcome = mirror.merge_cloud(record)?;
            let incident = if outcome.applied() {
                mirror.get(&record.id)?
            } else {
                None
            };
            (outcome, incident)
        };

        if let Some(incident) = incident {
            tracing::debug!("Realtime merge applied for incident {}", incident.id);
            self.observers.notify_incident(&incident);
        }

        Ok(outcome)
    }

    /// Record a transport connection transition and notify observers.
    pub fn set_connected(&self, connected: bool) {
        self.state.set_connected(connected);
        self.observers.notify_status(&self.state.snapshot());
    }

    /// Drive the merger from a feed channel until the transport closes it.
    pub fn spawn(self: Arc<Self>, mut feed: mpsc::Receiver<FeedEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = feed.recv().await {
                match event {
                    FeedEvent::Change(record) => {
                        if let Err(error) = self.apply(&record).await {
                            tracing::warn!(
                                "Realtime merge failed for incident {}: {error}",
                                record.id
                            );
                        }
                    }
                    FeedEvent::Connection(connected) => self.set_connected(connected),
                }
            }
            tracing::debug!("Change feed closed");
        })
    }
}
