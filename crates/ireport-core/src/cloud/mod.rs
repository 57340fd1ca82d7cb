//! Cloud backend contract
//!
//! The cloud relational store is the single source of truth for conflict
//! arbitration. This module defines the wire records and the async trait the
//! sync engines talk through; the REST implementation lives in [`rest`].

mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{AgencyType, IncidentId, IncidentStatus};

pub use rest::{CloudConfig, RestBackend};

/// An incident record as the cloud returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudIncident {
    pub id: IncidentId,
    pub agency_type: AgencyType,
    #[serde(default)]
    pub reporter_id: Option<String>,
    #[serde(default)]
    pub reporter_name: Option<String>,
    #[serde(default)]
    pub reporter_age: Option<i64>,
    #[serde(default)]
    pub description: String,
    pub status: IncidentStatus,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub updated_by: Option<String>,
}

/// Payload for creating an incident record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIncident {
    pub agency_type: AgencyType,
    pub reporter_id: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_age: Option<i64>,
    pub description: String,
    pub status: IncidentStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub media_urls: Vec<String>,
    pub created_at: i64,
}

/// Mutable fields pushed for a staff status edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentPatch {
    pub status: IncidentStatus,
    pub updated_at: i64,
    pub updated_by: Option<String>,
}

/// Payload for the cloud's append-only history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudHistoryEntry {
    pub incident_id: IncidentId,
    pub status: IncidentStatus,
    pub notes: String,
    pub changed_by: String,
    pub changed_at: i64,
}

/// Result of the nearest responder station lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationAssignment {
    pub station_id: i64,
    pub station_name: String,
    #[serde(default)]
    pub distance_km: Option<f64>,
}

/// Operations the sync engines need from the cloud store.
///
/// The backend supports filtered, ordered row reads, single-row reads by id,
/// row writes, and one best-effort RPC. Implementations are opaque; the
/// engines never assume a write succeeded until the call returns `Ok`.
#[async_trait]
pub trait CloudBackend: Send + Sync {
    /// Fetch all incidents with `updated_at >= watermark`, oldest first.
    async fn fetch_incidents_since(&self, watermark: i64) -> Result<Vec<CloudIncident>>;

    /// Read the cloud's current `updated_at` for one incident.
    ///
    /// Returns `None` when the record does not exist in the cloud.
    async fn fetch_updated_at(&self, id: &IncidentId) -> Result<Option<i64>>;

    /// Push a staff status edit.
    async fn update_incident(&self, id: &IncidentId, patch: &IncidentPatch) -> Result<()>;

    /// Create an incident record; returns the stored record.
    async fn insert_incident(&self, incident: &NewIncident) -> Result<CloudIncident>;

    /// Append one entry to the cloud's status history table.
    async fn insert_status_history(&self, entry: &CloudHistoryEntry) -> Result<()>;

    /// Look up the nearest responder station for an agency.
    async fn find_nearest_station(
        &self,
        latitude: f64,
        longitude: f64,
        agency: AgencyType,
    ) -> Result<Option<StationAssignment>>;

    /// Record a station assignment on an incident.
    async fn assign_station(&self, id: &IncidentId, station_id: i64) -> Result<()>;
}
