//! Outbound change queue repository

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{ChangeAction, OutboundChange};
use crate::util::now_ms;

/// Push attempts before an item is dead-lettered
pub const MAX_PUSH_ATTEMPTS: i64 = 5;

/// What `record_failure` did with the failed item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Item stays queued for another attempt
    Retained { attempts: i64 },
    /// Item hit the attempt ceiling and moved to the dead-letter table
    DeadLettered,
}

/// Trait for push queue operations
pub trait OutboundChangeRepository {
    /// Queue a change for push
    fn enqueue(&self, table_name: &str, record_id: &str, action: ChangeAction) -> Result<i64>;

    /// Oldest queued changes, up to `limit`
    fn oldest(&self, limit: usize) -> Result<Vec<OutboundChange>>;

    /// Remove a change after a successful push (or a resolved conflict)
    fn delete(&self, id: i64) -> Result<()>;

    /// Record a failed push attempt; dead-letters the item at the ceiling
    fn record_failure(&self, id: i64, error: &str) -> Result<FailureDisposition>;

    /// Number of queued changes
    fn count(&self) -> Result<usize>;

    /// Number of dead-lettered changes
    fn dead_letter_count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `OutboundChangeRepository`
pub struct SqliteOutboundChangeRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteOutboundChangeRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_change(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutboundChange> {
        Ok(OutboundChange {
            id: row.get(0)?,
            table_name: row.get(1)?,
            record_id: row.get(2)?,
            action: row.get(3)?,
            created_at: row.get(4)?,
            attempts: row.get(5)?,
            last_error: row.get(6)?,
        })
    }
}

impl OutboundChangeRepository for SqliteOutboundChangeRepository<'_> {
    fn enqueue(&self, table_name: &str, record_id: &str, action: ChangeAction) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sync_queue (table_name, record_id, action, created_at)
             VALUES (?, ?, ?, ?)",
            params![table_name, record_id, action, now_ms()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn oldest(&self, limit: usize) -> Result<Vec<OutboundChange>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, table_name, record_id, action, created_at, attempts, last_error
             FROM sync_queue
             ORDER BY created_at ASC, id ASC
             LIMIT ?",
        )?;

        let changes = stmt
            .query_map(params![limit as i64], Self::parse_change)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(changes)
    }

    fn delete(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_queue WHERE id = ?", params![id])?;
        Ok(())
    }

    fn record_failure(&self, id: i64, error: &str) -> Result<FailureDisposition> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "UPDATE sync_queue SET attempts = attempts + 1, last_error = ? WHERE id = ?",
            params![error, id],
        )?;

        let attempts: Option<i64> = tx
            .query_row(
                "SELECT attempts FROM sync_queue WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        let disposition = match attempts {
            Some(attempts) if attempts >= MAX_PUSH_ATTEMPTS => {
                tx.execute(
                    "INSERT INTO sync_dead_letter
                        (table_name, record_id, action, created_at, attempts, last_error,
                         dead_lettered_at)
                     SELECT table_name, record_id, action, created_at, attempts, last_error, ?
                     FROM sync_queue WHERE id = ?",
                    params![now_ms(), id],
                )?;
                tx.execute("DELETE FROM sync_queue WHERE id = ?", params![id])?;
                FailureDisposition::DeadLettered
            }
            Some(attempts) => FailureDisposition::Retained { attempts },
            // Row vanished under us; treat as already resolved
            None => FailureDisposition::Retained { attempts: 0 },
        };

        tx.commit()?;
        Ok(disposition)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn dead_letter_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM sync_dead_letter", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
