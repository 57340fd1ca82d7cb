//! Direct submission path.
//!
//! When the device is online a report goes straight to the cloud: media
//! uploads, the record insert, and the best-effort station assignment. Any
//! failure falls back to the offline capture queue so the report is never
//! lost at submission time.

use std::sync::Arc;

use ireport_core::cloud::{CloudIncident, StationAssignment};
use ireport_core::models::{QueuedSubmission, SubmissionPayload};
use ireport_core::net::Connectivity;
use ireport_core::Result;

use crate::queue::OfflineQueue;

/// Where a submission ended up.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// The incident record was created in the cloud
    Submitted {
        incident: CloudIncident,
        station: Option<StationAssignment>,
    },
    /// The report was persisted for later replay
    Queued(QueuedSubmission),
}

/// Entry point for the reporter client's submit action.
pub struct Submitter {
    queue: Arc<OfflineQueue>,
    connectivity: Connectivity,
}

impl Submitter {
    /// Create a submitter sharing the reporter's queue and connectivity
    /// watcher.
    pub fn new(queue: Arc<OfflineQueue>, connectivity: Connectivity) -> Self {
        Self {
            queue,
            connectivity,
        }
    }

    /// Submit a report, falling back to the offline queue when the cloud is
    /// unreachable.
    pub async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionOutcome> {
        if !self.connectivity.is_online() {
            tracing::info!("Device offline; queueing submission");
            let item = self.queue.enqueue(payload).await?;
            return Ok(SubmissionOutcome::Queued(item));
        }

        let staged = QueuedSubmission::new(payload.clone());
        match self.queue.deliver(&staged).await {
            Ok(incident) => {
                let station = match self.queue.assign_nearest_station(&incident).await {
                    Ok(station) => station,
                    Err(error) => {
                        tracing::warn!(
                            "Auto-assignment failed for incident {}: {error}",
                            incident.id
                        );
                        None
                    }
                };
                Ok(SubmissionOutcome::Submitted { incident, station })
            }
            Err(error) => {
                tracing::warn!("Direct submission failed, queueing for replay: {error}");
                let item = self.queue.enqueue(payload).await?;
                Ok(SubmissionOutcome::Queued(item))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{payload, MockBackend, MockStorage};
    use ireport_core::cloud::CloudBackend;
    use ireport_core::services::DatabaseService;
    use ireport_core::storage::BlobStorage;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    fn submitter_for(
        backend: &Arc<MockBackend>,
        online: bool,
    ) -> (Submitter, Arc<OfflineQueue>, Connectivity) {
        let db = DatabaseService::open_in_memory().unwrap();
        let storage: Arc<dyn BlobStorage> = Arc::new(MockStorage::default());
        let queue = Arc::new(OfflineQueue::new(
            db,
            Arc::clone(backend) as Arc<dyn CloudBackend>,
            storage,
        ));
        let connectivity = Connectivity::new(online);
        (
            Submitter::new(Arc::clone(&queue), connectivity.clone()),
            queue,
            connectivity,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_submit_online_goes_direct() {
        let backend = Arc::new(MockBackend::default());
        let (submitter, queue, _connectivity) = submitter_for(&backend, true);

        let outcome = submitter.submit(&payload("direct")).await.unwrap();

        assert!(matches!(outcome, SubmissionOutcome::Submitted { .. }));
        assert_eq!(backend.inserted.lock().unwrap().len(), 1);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_submit_offline_queues_without_network() {
        let backend = Arc::new(MockBackend::default());
        let (submitter, queue, _connectivity) = submitter_for(&backend, false);

        let outcome = submitter.submit(&payload("offline")).await.unwrap();

        assert!(matches!(outcome, SubmissionOutcome::Queued(_)));
        assert_eq!(backend.insert_calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_submit_failure_falls_back_to_queue() {
        let backend = Arc::new(MockBackend::default());
        backend.fail_inserts.store(1, Ordering::SeqCst);
        let (submitter, queue, _connectivity) = submitter_for(&backend, true);

        let outcome = submitter.submit(&payload("flaky network")).await.unwrap();

        assert!(matches!(outcome, SubmissionOutcome::Queued(_)));
        assert_eq!(queue.pending_count().await.unwrap(), 1);

        // The queued copy replays successfully later
        let report = queue
            .replay_all(&crate::queue::NoopObserver)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.successful, 1);
    }
}
