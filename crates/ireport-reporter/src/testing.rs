//! Shared test fixtures for the reporter engine.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use ireport_core::cloud::{
    CloudBackend, CloudHistoryEntry, CloudIncident, IncidentPatch, NewIncident, StationAssignment,
};
use ireport_core::models::{AgencyType, IncidentId, SubmissionId, SubmissionPayload};
use ireport_core::storage::BlobStorage;
use ireport_core::{Error, Result};

use crate::queue::ReplayObserver;

pub fn payload(description: &str) -> SubmissionPayload {
    SubmissionPayload {
        agency_type: AgencyType::Pdrrmo,
        reporter_id: None,
        reporter_name: Some("Maria".to_string()),
        reporter_age: Some(41),
        description: description.to_string(),
        latitude: 13.41,
        longitude: 122.56,
        address: "Barangay Uno".to_string(),
        media_paths: vec![],
    }
}

/// Payload whose media files actually exist on disk under `dir`.
pub fn payload_with_media(description: &str, dir: &Path, names: &[&str]) -> SubmissionPayload {
    let mut media_paths = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(name);
        std::fs::write(&path, b"media bytes").unwrap();
        media_paths.push(path.to_string_lossy().into_owned());
    }
    SubmissionPayload {
        media_paths,
        ..payload(description)
    }
}

/// In-memory cloud stand-in with failure injection.
#[derive(Default)]
pub struct MockBackend {
    pub inserted: Mutex<Vec<CloudIncident>>,
    pub history: Mutex<Vec<CloudHistoryEntry>>,
    pub assigned: Mutex<Vec<(IncidentId, i64)>>,
    /// Station returned by the nearest-station lookup
    pub station: Mutex<Option<StationAssignment>>,
    /// Upcoming `insert_incident` calls to fail
    pub fail_inserts: AtomicUsize,
    /// Upcoming `find_nearest_station` calls to fail
    pub fail_station_lookup: AtomicUsize,
    /// Artificial latency for `insert_incident`, in milliseconds
    pub insert_delay_ms: AtomicU64,
    pub insert_calls: AtomicUsize,
}

impl MockBackend {
    fn take_failure(counter: &AtomicUsize) -> bool {
        loop {
            let current = counter.load(Ordering::SeqCst);
            if current == 0 {
                return false;
            }
            if counter
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }
}

#[async_trait]
impl CloudBackend for MockBackend {
    async fn fetch_incidents_since(&self, _watermark: i64) -> Result<Vec<CloudIncident>> {
        Ok(vec![])
    }

    async fn fetch_updated_at(&self, _id: &IncidentId) -> Result<Option<i64>> {
        Ok(None)
    }

    async fn update_incident(&self, _id: &IncidentId, _patch: &IncidentPatch) -> Result<()> {
        Ok(())
    }

    async fn insert_incident(&self, incident: &NewIncident) -> Result<CloudIncident> {
        let delay = self.insert_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_inserts) {
            return Err(Error::Cloud("injected insert failure".to_string()));
        }

        let record = CloudIncident {
            id: IncidentId::new(),
            agency_type: incident.agency_type,
            reporter_id: incident.reporter_id.clone(),
            reporter_name: incident.reporter_name.clone(),
            reporter_age: incident.reporter_age,
            description: incident.description.clone(),
            status: incident.status,
            latitude: incident.latitude,
            longitude: incident.longitude,
            address: incident.address.clone(),
            media_urls: incident.media_urls.clone(),
            created_at: incident.created_at,
            updated_at: incident.created_at,
            updated_by: None,
        };
        self.inserted.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn insert_status_history(&self, entry: &CloudHistoryEntry) -> Result<()> {
        self.history.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn find_nearest_station(
        &self,
        _latitude: f64,
        _longitude: f64,
        _agency: AgencyType,
    ) -> Result<Option<StationAssignment>> {
        if Self::take_failure(&self.fail_station_lookup) {
            return Err(Error::Cloud("injected station lookup failure".to_string()));
        }
        Ok(self.station.lock().unwrap().clone())
    }

    async fn assign_station(&self, id: &IncidentId, station_id: i64) -> Result<()> {
        self.assigned.lock().unwrap().push((*id, station_id));
        Ok(())
    }
}

/// Blob storage stand-in recording uploads.
#[derive(Default)]
pub struct MockStorage {
    pub uploads: Mutex<Vec<String>>,
    /// Fail any upload whose object key contains this substring
    pub fail_keys_containing: Mutex<Option<String>>,
}

#[async_trait]
impl BlobStorage for MockStorage {
    async fn upload(&self, object_key: &str, _bytes: &[u8], _content_type: &str) -> Result<String> {
        if let Some(pattern) = self.fail_keys_containing.lock().unwrap().as_deref() {
            if object_key.contains(pattern) {
                return Err(Error::Storage("injected upload failure".to_string()));
            }
        }
        self.uploads.lock().unwrap().push(object_key.to_string());
        Ok(format!("https://cdn.test/{object_key}"))
    }
}

/// Observer recording every replay notification.
#[derive(Default)]
pub struct RecordingObserver {
    pub progress: Mutex<Vec<(usize, usize)>>,
    pub synced: Mutex<Vec<SubmissionId>>,
    pub failed: Mutex<Vec<SubmissionId>>,
}

impl ReplayObserver for RecordingObserver {
    fn on_progress(&self, current: usize, total: usize) {
        self.progress.lock().unwrap().push((current, total));
    }

    fn on_item_synced(&self, id: &SubmissionId) {
        self.synced.lock().unwrap().push(*id);
    }

    fn on_item_failed(&self, id: &SubmissionId, _error: &Error) {
        self.failed.lock().unwrap().push(*id);
    }
}
