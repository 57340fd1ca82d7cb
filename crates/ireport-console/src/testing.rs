//! Shared test fixtures for the console engine.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use ireport_core::cloud::{
    CloudBackend, CloudHistoryEntry, CloudIncident, IncidentPatch, NewIncident, StationAssignment,
};
use ireport_core::models::{AgencyType, IncidentId, IncidentStatus};
use ireport_core::{Error, Result};

use crate::status::{SyncObserver, SyncStatus};

pub fn cloud_record(id: IncidentId, status: IncidentStatus, updated_at: i64) -> CloudIncident {
    CloudIncident {
        id,
        agency_type: AgencyType::Pnp,
        reporter_id: Some("user-1".to_string()),
        reporter_name: Some("Ana".to_string()),
        reporter_age: Some(29),
        description: "Hit and run".to_string(),
        status,
        latitude: 14.6,
        longitude: 121.0,
        address: "Quezon City".to_string(),
        media_urls: vec![],
        created_at: 1_000,
        updated_at,
        updated_by: None,
    }
}

/// In-memory cloud stand-in with failure injection.
#[derive(Default)]
pub struct MockBackend {
    pub incidents: Mutex<Vec<CloudIncident>>,
    pub pushed_patches: Mutex<Vec<(IncidentId, IncidentPatch)>>,
    pub pushed_history: Mutex<Vec<CloudHistoryEntry>>,
    /// Upcoming `update_incident` calls to fail
    pub fail_updates: AtomicUsize,
    /// Upcoming `insert_status_history` calls to fail
    pub fail_history: AtomicUsize,
    /// Upcoming `fetch_incidents_since` calls to fail
    pub fail_fetch: AtomicUsize,
    /// When set, `fetch_incidents_since` returns nothing (feed not yet
    /// visible to pulls)
    pub hide_from_pull: AtomicBool,
    /// Artificial latency for `fetch_incidents_since`, in milliseconds
    pub fetch_delay_ms: AtomicU64,
    pub update_calls: AtomicUsize,
}

impl MockBackend {
    pub fn with_incidents(incidents: Vec<CloudIncident>) -> Self {
        Self {
            incidents: Mutex::new(incidents),
            ..Default::default()
        }
    }

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
    async fn fetch_incidents_since(&self, watermark: i64) -> Result<Vec<CloudIncident>> {
        let delay = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if Self::take_failure(&self.fail_fetch) {
            return Err(Error::Cloud("injected fetch failure".to_string()));
        }
        if self.hide_from_pull.load(Ordering::SeqCst) {
            return Ok(vec![]);
        }
        let mut records: Vec<CloudIncident> = self
            .incidents
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.updated_at >= watermark)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.updated_at);
        Ok(records)
    }

    async fn fetch_updated_at(&self, id: &IncidentId) -> Result<Option<i64>> {
        Ok(self
            .incidents
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.id == *id)
            .map(|record| record.updated_at))
    }

    async fn update_incident(&self, id: &IncidentId, patch: &IncidentPatch) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_updates) {
            return Err(Error::Cloud("injected update failure".to_string()));
        }

        let mut incidents = self.incidents.lock().unwrap();
        if let Some(record) = incidents.iter_mut().find(|record| record.id == *id) {
            record.status = patch.status;
            record.updated_at = patch.updated_at;
            record.updated_by.clone_from(&patch.updated_by);
        }
        drop(incidents);

        self.pushed_patches
            .lock()
            .unwrap()
            .push((*id, patch.clone()));
        Ok(())
    }

    async fn insert_incident(&self, incident: &NewIncident) -> Result<CloudIncident> {
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
        self.incidents.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn insert_status_history(&self, entry: &CloudHistoryEntry) -> Result<()> {
        if Self::take_failure(&self.fail_history) {
            return Err(Error::Cloud("injected history failure".to_string()));
        }
        self.pushed_history.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn find_nearest_station(
        &self,
        _latitude: f64,
        _longitude: f64,
        _agency: AgencyType,
    ) -> Result<Option<StationAssignment>> {
        Ok(None)
    }

    async fn assign_station(&self, _id: &IncidentId, _station_id: i64) -> Result<()> {
        Ok(())
    }
}

/// Observer that records every notification it receives.
#[derive(Default)]
pub struct RecordingObserver {
    pub statuses: Mutex<Vec<SyncStatus>>,
    pub incidents: Mutex<Vec<IncidentId>>,
}

impl SyncObserver for RecordingObserver {
    fn on_status_changed(&self, status: &SyncStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }

    fn on_incident_updated(&self, incident: &ireport_core::models::Incident) {
        self.incidents.lock().unwrap().push(incident.id);
    }
}
