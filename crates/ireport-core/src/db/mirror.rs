//! Incident mirror repository
//!
//! The desktop console's local copy of cloud incident state. All cloud-side
//! merges go through [`IncidentMirrorRepository::merge_cloud`], which applies
//! the last-writer-wins rule shared by the pull pass and the realtime feed.

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use rusqlite::{params, Connection, OptionalExtension};

use crate::cloud::CloudIncident;
use crate::error::{Error, Result};
use crate::models::{AgencyType, Incident, IncidentId, IncidentStatus};

/// What `merge_cloud` did with an incoming record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local copy existed; the record was inserted
    Inserted,
    /// The cloud version overwrote the local copy
    Updated,
    /// An un-synced local edit was newer (or tied); the record was not applied
    Skipped,
}

impl MergeOutcome {
    /// Whether the local row now reflects the incoming cloud record
    #[must_use]
    pub const fn applied(&self) -> bool {
        matches!(self, Self::Inserted | Self::Updated)
    }
}

/// Query filter for listing mirrored incidents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentFilter {
    pub agency: Option<AgencyType>,
    pub status: Option<IncidentStatus>,
    pub limit: Option<usize>,
}

/// Aggregate counts for the console dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub total: usize,
    pub pending: usize,
    pub assigned: usize,
    pub responding: usize,
    pub resolved: usize,
}

/// Trait for mirror storage operations
pub trait IncidentMirrorRepository {
    /// Get an incident by ID
    fn get(&self, id: &IncidentId) -> Result<Option<Incident>>;

    /// List incidents, newest first
    fn list(&self, filter: &IncidentFilter) -> Result<Vec<Incident>>;

    /// Merge a cloud record into the mirror using the conflict rule
    fn merge_cloud(&self, record: &CloudIncident) -> Result<MergeOutcome>;

    /// Apply a staff status edit to the incident row (marks it un-synced)
    fn apply_status_edit(
        &self,
        id: &IncidentId,
        status: IncidentStatus,
        updated_at: i64,
        updated_by: &str,
    ) -> Result<Incident>;

    /// Mark an incident as fully pushed
    fn mark_synced(&self, id: &IncidentId) -> Result<()>;

    /// Aggregate status counts
    fn stats(&self) -> Result<MirrorStats>;
}

/// `SQLite` implementation of `IncidentMirrorRepository`
pub struct SqliteIncidentMirrorRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteIncidentMirrorRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an incident from a database row
    fn parse_incident(row: &rusqlite::Row<'_>) -> rusqlite::Result<Incident> {
        let id: String = row.get(0)?;
        let media_urls: String = row.get(10)?;
        Ok(Incident {
            id: id.parse().unwrap_or_default(),
            agency_type: row.get(1)?,
            reporter_id: row.get(2)?,
            reporter_name: row.get(3)?,
            reporter_age: row.get(4)?,
            description: row.get(5)?,
            status: row.get(6)?,
            latitude: row.get(7)?,
            longitude: row.get(8)?,
            address: row.get(9)?,
            media_urls: serde_json::from_str(&media_urls).unwrap_or_default(),
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
            updated_by: row.get(13)?,
            cloud_updated_at: row.get(14)?,
            synced: row.get::<_, i64>(15)? != 0,
        })
    }

    const SELECT_COLUMNS: &'static str = "id, agency_type, reporter_id, reporter_name, \
         reporter_age, description, status, latitude, longitude, address, media_urls, \
         created_at, updated_at, updated_by, cloud_updated_at, synced";
}

impl IncidentMirrorRepository for SqliteIncidentMirrorRepository<'_> {
    fn get(&self, id: &IncidentId) -> Result<Option<Incident>> {
        let sql = format!(
            "SELECT {} FROM incidents WHERE id = ?",
            Self::SELECT_COLUMNS
        );
        let incident = self
            .conn
            .query_row(&sql, params![id.as_str()], Self::parse_incident)
            .optional()?;
        Ok(incident)
    }

    fn list(&self, filter: &IncidentFilter) -> Result<Vec<Incident>> {
        let mut sql = format!("SELECT {} FROM incidents WHERE 1=1", Self::SELECT_COLUMNS);
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(agency) = filter.agency {
            sql.push_str(" AND agency_type = ?");
            args.push(Box::new(agency));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            args.push(Box::new(status));
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            args.push(Box::new(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let incidents = stmt
            .query_map(
                rusqlite::params_from_iter(args.iter().map(|arg| &**arg)),
                Self::parse_incident,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(incidents)
    }

    fn merge_cloud(&self, record: &CloudIncident) -> Result<MergeOutcome> {
        let tx = self.conn.unchecked_transaction()?;

        let local: Option<(i64, bool)> = tx
            .query_row(
                "SELECT updated_at, synced FROM incidents WHERE id = ?",
                params![record.id.as_str()],
                |row| Ok((row.get(0)?, row.get::<_, i64>(1)? != 0)),
            )
            .optional()?;

        let outcome = match local {
            None => {
                tx.execute(
                    "INSERT INTO incidents (
                        id, agency_type, reporter_id, reporter_name, reporter_age,
                        description, status, latitude, longitude, address, media_urls,
                        created_at, updated_at, updated_by, cloud_updated_at, synced
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
                    params![
                        record.id.as_str(),
                        record.agency_type,
                        record.reporter_id,
                        record.reporter_name,
                        record.reporter_age,
                        record.description,
                        record.status,
                        record.latitude,
                        record.longitude,
                        record.address,
                        serde_json::to_string(&record.media_urls)?,
                        record.created_at,
                        record.updated_at,
                        record.updated_by,
                        record.updated_at,
                    ],
                )?;
                MergeOutcome::Inserted
            }
            Some((local_updated_at, synced)) => {
                // Cloud wins only when the local copy has nothing pending or
                // the cloud timestamp is strictly newer; an un-synced local
                // edit survives a tie.
                if synced || record.updated_at > local_updated_at {
                    // MAX keeps cloud_updated_at from regressing on
                    // out-of-order feed events.
                    tx.execute(
                        "UPDATE incidents SET
                            status = ?,
                            updated_at = ?,
                            updated_by = ?,
                            cloud_updated_at = MAX(cloud_updated_at, ?),
                            synced = 1
                         WHERE id = ?",
                        params![
                            record.status,
                            record.updated_at,
                            record.updated_by,
                            record.updated_at,
                            record.id.as_str(),
                        ],
                    )?;
                    MergeOutcome::Updated
                } else {
                    MergeOutcome::Skipped
                }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn apply_status_edit(
        &self,
        id: &IncidentId,
        status: IncidentStatus,
        updated_at: i64,
        updated_by: &str,
    ) -> Result<Incident> {
        let rows = self.conn.execute(
            "UPDATE incidents SET status = ?, updated_at = ?, updated_by = ?, synced = 0
             WHERE id = ?",
            params![status, updated_at, updated_by, id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        self.get(id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn mark_synced(&self, id: &IncidentId) -> Result<()> {
        self.conn.execute(
            "UPDATE incidents SET synced = 1 WHERE id = ?",
            params![id.as_str()],
        )?;
        Ok(())
    }

    fn stats(&self) -> Result<MirrorStats> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM incidents GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, IncidentStatus>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stats = MirrorStats::default();
        for (status, count) in rows {
            let count = usize::try_from(count).unwrap_or(0);
            stats.total += count;
            match status {
                IncidentStatus::Pending => stats.pending = count,
                IncidentStatus::Assigned => stats.assigned = count,
                IncidentStatus::Responding => stats.responding = count,
                IncidentStatus::Resolved => stats.resolved = count,
            }
        }
        Ok(stats)
    }
}
