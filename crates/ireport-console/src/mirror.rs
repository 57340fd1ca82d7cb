//! Local mirror service for staff edits.
//!
//! Every status edit performs three effects in one store transaction: the
//! incident row update, the audit history append, and the outbound change
//! enqueue. Callers never reason about sync separately.

use ireport_core::db::{
    IncidentFilter, IncidentMirrorRepository, MirrorStats, OutboundChangeRepository,
    SqliteIncidentMirrorRepository, SqliteOutboundChangeRepository,
    SqliteStatusHistoryRepository, StatusHistoryRepository,
};
use ireport_core::models::{
    ChangeAction, Incident, IncidentId, IncidentStatus, StatusHistoryEntry,
};
use ireport_core::services::DatabaseService;
use ireport_core::util::now_ms;
use ireport_core::{Error, Result};

/// Read/write surface over the console's local incident mirror.
#[derive(Clone)]
pub struct MirrorService {
    db: DatabaseService,
}

impl MirrorService {
    /// Create a service over the console's store.
    #[must_use]
    pub const fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Apply a staff status edit.
    ///
    /// Atomically updates the incident row, appends an un-synced history
    /// entry, and queues an outbound `update` for the next push pass.
    pub async fn update_status(
        &self,
        id: &IncidentId,
        status: IncidentStatus,
        notes: &str,
        updated_by: &str,
    ) -> Result<Incident> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let tx = conn.unchecked_transaction()?;
        let mirror = SqliteIncidentMirrorRepository::new(conn);
        let history = SqliteStatusHistoryRepository::new(conn);
        let queue = SqliteOutboundChangeRepository::new(conn);

        let current = mirror
            .get(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        // Keep updated_at non-decreasing even when a cloud merge carried a
        // timestamp ahead of this machine's clock
        let now = now_ms().max(current.updated_at);

        let incident = mirror.apply_status_edit(id, status, now, updated_by)?;
        history.append(id, status, notes, updated_by, now)?;
        queue.enqueue("incidents", &id.as_str(), ChangeAction::Update)?;
        tx.commit()?;

        tracing::debug!("Status edit queued for incident {id}: {status}");
        Ok(incident)
    }

    /// Get one mirrored incident.
    pub async fn incident(&self, id: &IncidentId) -> Result<Option<Incident>> {
        let db = self.db.lock().await;
        SqliteIncidentMirrorRepository::new(db.connection()).get(id)
    }

    /// List mirrored incidents, newest first.
    pub async fn incidents(&self, filter: &IncidentFilter) -> Result<Vec<Incident>> {
        let db = self.db.lock().await;
        SqliteIncidentMirrorRepository::new(db.connection()).list(filter)
    }

    /// Full audit history for one incident, newest first.
    pub async fn history(&self, id: &IncidentId) -> Result<Vec<StatusHistoryEntry>> {
        let db = self.db.lock().await;
        SqliteStatusHistoryRepository::new(db.connection()).list_for_incident(id)
    }

    /// Aggregate status counts for the dashboard.
    pub async fn stats(&self) -> Result<MirrorStats> {
        let db = self.db.lock().await;
        SqliteIncidentMirrorRepository::new(db.connection()).stats()
    }

    /// Outbound changes awaiting push.
    pub async fn pending_changes(&self) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteOutboundChangeRepository::new(db.connection()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::cloud_record;
    use pretty_assertions::assert_eq;

    async fn setup() -> (MirrorService, IncidentId) {
        let db = DatabaseService::open_in_memory().unwrap();
        let id = IncidentId::new();
        {
            let guard = db.lock().await;
            SqliteIncidentMirrorRepository::new(guard.connection())
                .merge_cloud(&cloud_record(id, IncidentStatus::Pending, 1_000))
                .unwrap();
        }
        (MirrorService::new(db), id)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_status_performs_three_effects() {
        let (service, id) = setup().await;

        let incident = service
            .update_status(&id, IncidentStatus::Responding, "on the way", "officer-1")
            .await
            .unwrap();

        assert_eq!(incident.status, IncidentStatus::Responding);
        assert!(!incident.synced);

        let history = service.history(&id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].notes, "on the way");
        assert!(!history[0].synced);

        assert_eq!(service.pending_changes().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_status_unknown_incident_leaves_no_trace() {
        let (service, _) = setup().await;
        let missing = IncidentId::new();

        let result = service
            .update_status(&missing, IncidentStatus::Resolved, "", "officer-1")
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        // The failed edit must not leave a queued change or history entry
        assert_eq!(service.pending_changes().await.unwrap(), 0);
        assert!(service.history(&missing).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_status_keeps_updated_at_monotonic() {
        let (service, id) = setup().await;

        // Mirror carries a timestamp far in the future (cloud clock skew)
        let future = now_ms() + 60_000;
        {
            let db = service.db.lock().await;
            SqliteIncidentMirrorRepository::new(db.connection())
                .merge_cloud(&cloud_record(id, IncidentStatus::Assigned, future))
                .unwrap();
        }

        let incident = service
            .update_status(&id, IncidentStatus::Responding, "", "officer-1")
            .await
            .unwrap();
        assert!(incident.updated_at >= future);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stats_reflect_edits() {
        let (service, id) = setup().await;

        service
            .update_status(&id, IncidentStatus::Resolved, "", "officer-1")
            .await
            .unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.pending, 0);
    }
}
