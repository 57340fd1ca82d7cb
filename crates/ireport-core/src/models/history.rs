//! Append-only status history model

use serde::{Deserialize, Serialize};

use super::{IncidentId, IncidentStatus};

/// One status change, recorded locally and reconciled to the cloud's
/// append-only history table.
///
/// Rows are never mutated after creation except for the `synced` flag, and
/// never destroyed (retained for audit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    /// Local row id
    pub id: i64,
    /// Incident the change belongs to
    pub incident_id: IncidentId,
    /// Status that was set
    pub status: IncidentStatus,
    /// Operator notes
    pub notes: String,
    /// Who made the change
    pub changed_by: String,
    /// When the change was made (Unix ms)
    pub changed_at: i64,
    /// Whether this entry has been pushed to the cloud
    pub synced: bool,
}
