//! Incident model

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for an incident, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncidentId(Uuid);

impl IncidentId {
    /// Create a new unique incident ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for IncidentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IncidentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Response agency an incident is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgencyType {
    /// Philippine National Police
    Pnp,
    /// Bureau of Fire Protection
    Bfp,
    /// Provincial Disaster Risk Reduction and Management Office
    Pdrrmo,
}

impl AgencyType {
    /// Wire/storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pnp => "pnp",
            Self::Bfp => "bfp",
            Self::Pdrrmo => "pdrrmo",
        }
    }

    /// Numeric agency identifier used by the nearest-station RPC
    #[must_use]
    pub const fn station_lookup_id(&self) -> i64 {
        match self {
            Self::Pnp => 1,
            Self::Bfp => 2,
            Self::Pdrrmo => 3,
        }
    }
}

impl fmt::Display for AgencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AgencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pnp" => Ok(Self::Pnp),
            "bfp" => Ok(Self::Bfp),
            "pdrrmo" => Ok(Self::Pdrrmo),
            other => Err(format!("Unknown agency type: {other}")),
        }
    }
}

impl ToSql for AgencyType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for AgencyType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// Lifecycle status of an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    /// Newly reported, awaiting triage
    Pending,
    /// Auto-assigned to a responder station
    Assigned,
    /// Responders dispatched
    Responding,
    /// Closed out
    Resolved,
}

impl IncidentStatus {
    /// Wire/storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Responding => "responding",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "assigned" => Ok(Self::Assigned),
            "responding" => Ok(Self::Responding),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!("Unknown incident status: {other}")),
        }
    }
}

impl ToSql for IncidentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for IncidentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// An incident row in the local mirror.
///
/// Origin fields (`agency_type`, reporter info, location, `media_urls`,
/// `description`, `created_at`) never change after creation. `status`,
/// `updated_at`, and `updated_by` are the mutable surface edited by agency
/// staff. `cloud_updated_at` records the cloud's own `updated_at` at the
/// last successful merge and only ever advances; `synced` means this local
/// copy has no outstanding edits not yet reflected in `cloud_updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier
    pub id: IncidentId,
    /// Agency the report was filed with
    pub agency_type: AgencyType,
    /// Authenticated reporter id, if any
    pub reporter_id: Option<String>,
    /// Reporter-provided name
    pub reporter_name: Option<String>,
    /// Reporter-provided age
    pub reporter_age: Option<i64>,
    /// Free-text description of the incident
    pub description: String,
    /// Current status
    pub status: IncidentStatus,
    /// GPS latitude
    pub latitude: f64,
    /// GPS longitude
    pub longitude: f64,
    /// Reverse-geocoded address
    pub address: String,
    /// Public URLs of uploaded media
    pub media_urls: Vec<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Who last updated the status
    pub updated_by: Option<String>,
    /// Cloud's `updated_at` at the last successful merge (Unix ms)
    pub cloud_updated_at: i64,
    /// Whether all local edits are reflected in the cloud
    pub synced: bool,
}
