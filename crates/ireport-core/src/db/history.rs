//! Status history repository

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{IncidentId, IncidentStatus, StatusHistoryEntry};

/// Trait for append-only status history operations
pub trait StatusHistoryRepository {
    /// Append one history entry (created with `synced = false`)
    fn append(
        &self,
        incident_id: &IncidentId,
        status: IncidentStatus,
        notes: &str,
        changed_by: &str,
        changed_at: i64,
    ) -> Result<i64>;

    /// All entries not yet reconciled to the cloud, oldest first
    fn unsynced(&self) -> Result<Vec<StatusHistoryEntry>>;

    /// Mark one entry as reconciled
    fn mark_synced(&self, id: i64) -> Result<()>;

    /// Full history for one incident, newest first
    fn list_for_incident(&self, incident_id: &IncidentId) -> Result<Vec<StatusHistoryEntry>>;
}

/// `SQLite` implementation of `StatusHistoryRepository`
pub struct SqliteStatusHistoryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStatusHistoryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatusHistoryEntry> {
        let incident_id: String = row.get(1)?;
        Ok(StatusHistoryEntry {
            id: row.get(0)?,
            incident_id: incident_id.parse().unwrap_or_default(),
            status: row.get(2)?,
            notes: row.get(3)?,
            changed_by: row.get(4)?,
            changed_at: row.get(5)?,
            synced: row.get::<_, i64>(6)? != 0,
        })
    }
}

impl StatusHistoryRepository for SqliteStatusHistoryRepository<'_> {
    fn append(
        &self,
        incident_id: &IncidentId,
        status: IncidentStatus,
        notes: &str,
        changed_by: &str,
        changed_at: i64,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO status_history (incident_id, status, notes, changed_by, changed_at, synced)
             VALUES (?, ?, ?, ?, ?, 0)",
            params![incident_id.as_str(), status, notes, changed_by, changed_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn unsynced(&self) -> Result<Vec<StatusHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, incident_id, status, notes, changed_by, changed_at, synced
             FROM status_history
             WHERE synced = 0
             ORDER BY changed_at ASC, id ASC",
        )?;

        let entries = stmt
            .query_map([], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn mark_synced(&self, id: i64) -> Result<()> {
        self.conn
            .execute("UPDATE status_history SET synced = 1 WHERE id = ?", params![id])?;
        Ok(())
    }

    fn list_for_incident(&self, incident_id: &IncidentId) -> Result<Vec<StatusHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, incident_id, status, notes, changed_by, changed_at, synced
             FROM status_history
             WHERE incident_id = ?
             ORDER BY changed_at DESC, id DESC",
        )?;

        let entries = stmt
            .query_map(params![incident_id.as_str()], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }
}
