//! Offline capture queue repository

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{QueuedSubmission, SubmissionId, SubmissionPayload};
use crate::util::now_ms;

/// Replay attempts before a submission is considered exhausted
pub const MAX_SUBMISSION_RETRIES: i64 = 3;

/// Trait for offline submission queue operations
pub trait OfflineQueueRepository {
    /// Persist a submission; never touches the network
    fn enqueue(&self, payload: &SubmissionPayload) -> Result<QueuedSubmission>;

    /// All queued submissions in FIFO order
    fn all(&self) -> Result<Vec<QueuedSubmission>>;

    /// Remove a submission after its incident record insert succeeded
    fn remove(&self, id: &SubmissionId) -> Result<()>;

    /// Record a failed replay attempt
    fn increment_retry(&self, id: &SubmissionId) -> Result<()>;

    /// Number of queued submissions
    fn count(&self) -> Result<usize>;

    /// Submissions at the retry ceiling, kept queued so the failure can be
    /// surfaced to the user instead of silently dropped
    fn exhausted(&self) -> Result<Vec<QueuedSubmission>>;

    /// Reset retry counters at the user's explicit request
    fn reset_retries(&self) -> Result<usize>;
}

/// `SQLite` implementation of `OfflineQueueRepository`
pub struct SqliteOfflineQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteOfflineQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_submission(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueuedSubmission> {
        let id: String = row.get(0)?;
        let media_paths: String = row.get(9)?;
        Ok(QueuedSubmission {
            id: id.parse().unwrap_or_default(),
            payload: SubmissionPayload {
                agency_type: row.get(1)?,
                reporter_id: row.get(2)?,
                reporter_name: row.get(3)?,
                reporter_age: row.get(4)?,
                description: row.get(5)?,
                latitude: row.get(6)?,
                longitude: row.get(7)?,
                address: row.get(8)?,
                media_paths: serde_json::from_str(&media_paths).unwrap_or_default(),
            },
            created_at: row.get(10)?,
            retry_count: row.get(11)?,
        })
    }

    const SELECT: &'static str = "SELECT id, agency_type, reporter_id, reporter_name, \
         reporter_age, description, latitude, longitude, address, media_paths, \
         created_at, retry_count FROM offline_queue";
}

impl OfflineQueueRepository for SqliteOfflineQueueRepository<'_> {
    fn enqueue(&self, payload: &SubmissionPayload) -> Result<QueuedSubmission> {
        let item = QueuedSubmission {
            id: SubmissionId::new(),
            payload: payload.clone(),
            created_at: now_ms(),
            retry_count: 0,
        };

        self.conn.execute(
            "INSERT INTO offline_queue (
                id, agency_type, reporter_id, reporter_name, reporter_age,
                description, latitude, longitude, address, media_paths,
                created_at, retry_count
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)",
            params![
                item.id.as_str(),
                item.payload.agency_type,
                item.payload.reporter_id,
                item.payload.reporter_name,
                item.payload.reporter_age,
                item.payload.description,
                item.payload.latitude,
                item.payload.longitude,
                item.payload.address,
                serde_json::to_string(&item.payload.media_paths)?,
                item.created_at,
            ],
        )?;

        Ok(item)
    }

    fn all(&self) -> Result<Vec<QueuedSubmission>> {
        let sql = format!("{} ORDER BY created_at ASC, id ASC", Self::SELECT);
        let mut stmt = self.conn.prepare(&sql)?;

        let items = stmt
            .query_map([], Self::parse_submission)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(items)
    }

    fn remove(&self, id: &SubmissionId) -> Result<()> {
        self.conn
            .execute("DELETE FROM offline_queue WHERE id = ?", params![id.as_str()])?;
        Ok(())
    }

    fn increment_retry(&self, id: &SubmissionId) -> Result<()> {
        self.conn.execute(
            "UPDATE offline_queue SET retry_count = retry_count + 1 WHERE id = ?",
            params![id.as_str()],
        )?;
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM offline_queue", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn exhausted(&self) -> Result<Vec<QueuedSubmission>> {
        let sql = format!(
            "{} WHERE retry_count >= ? ORDER BY created_at ASC, id ASC",
            Self::SELECT
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let items = stmt
            .query_map(params![MAX_SUBMISSION_RETRIES], Self::parse_submission)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(items)
    }

    fn reset_retries(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE offline_queue SET retry_count = 0 WHERE retry_count >= ?",
            params![MAX_SUBMISSION_RETRIES],
        )?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::AgencyType;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn payload(description: &str) -> SubmissionPayload {
        SubmissionPayload {
            agency_type: AgencyType::Pdrrmo,
            reporter_id: None,
            reporter_name: Some("Maria".to_string()),
            reporter_age: None,
            description: description.to_string(),
            latitude: 13.41,
            longitude: 122.56,
            address: "Barangay Uno".to_string(),
            media_paths: vec!["/tmp/a.jpg".to_string()],
        }
    }

    #[test]
    fn test_enqueue_and_fifo_order() {
        let db = setup();
        let repo = SqliteOfflineQueueRepository::new(db.connection());

        repo.enqueue(&payload("first")).unwrap();
        repo.enqueue(&payload("second")).unwrap();
        repo.enqueue(&payload("third")).unwrap();

        let items = repo.all().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].payload.description, "first");
        assert_eq!(items[2].payload.description, "third");
        assert_eq!(repo.count().unwrap(), 3);
    }

    #[test]
    fn test_remove_deletes_exactly_one() {
        let db = setup();
        let repo = SqliteOfflineQueueRepository::new(db.connection());

        let kept = repo.enqueue(&payload("keep")).unwrap();
        let gone = repo.enqueue(&payload("drop")).unwrap();

        repo.remove(&gone.id).unwrap();
        // Removing again is a no-op
        repo.remove(&gone.id).unwrap();

        let items = repo.all().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, kept.id);
    }

    #[test]
    fn test_retry_count_round_trip() {
        let db = setup();
        let repo = SqliteOfflineQueueRepository::new(db.connection());

        let item = repo.enqueue(&payload("flaky")).unwrap();
        repo.increment_retry(&item.id).unwrap();
        repo.increment_retry(&item.id).unwrap();

        let items = repo.all().unwrap();
        assert_eq!(items[0].retry_count, 2);
        assert!(repo.exhausted().unwrap().is_empty());

        repo.increment_retry(&item.id).unwrap();
        let exhausted = repo.exhausted().unwrap();
        assert_eq!(exhausted.len(), 1);
        assert_eq!(exhausted[0].id, item.id);
    }

    #[test]
    fn test_reset_retries_revives_exhausted_items() {
        let db = setup();
        let repo = SqliteOfflineQueueRepository::new(db.connection());

        let item = repo.enqueue(&payload("flaky")).unwrap();
        for _ in 0..MAX_SUBMISSION_RETRIES {
            repo.increment_retry(&item.id).unwrap();
        }
        assert_eq!(repo.exhausted().unwrap().len(), 1);

        let reset = repo.reset_retries().unwrap();
        assert_eq!(reset, 1);
        assert!(repo.exhausted().unwrap().is_empty());
        assert_eq!(repo.all().unwrap()[0].retry_count, 0);
    }

    #[test]
    fn test_media_paths_survive_round_trip() {
        let db = setup();
        let repo = SqliteOfflineQueueRepository::new(db.connection());

        repo.enqueue(&payload("with media")).unwrap();
        let items = repo.all().unwrap();
        assert_eq!(items[0].payload.media_paths, vec!["/tmp/a.jpg".to_string()]);
    }
}
