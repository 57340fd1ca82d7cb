//! Sync metadata repository (pull watermark)

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

const LAST_PULL_KEY: &str = "last_pull";

/// Trait for sync metadata operations
pub trait SyncMetaRepository {
    /// Newest cloud `updated_at` already merged into the mirror (Unix ms).
    ///
    /// Defaults to the epoch (0) before the first pull.
    fn last_pull(&self) -> Result<i64>;

    /// Advance the pull watermark
    fn set_last_pull(&self, timestamp: i64) -> Result<()>;
}

/// `SQLite` implementation of `SyncMetaRepository`
pub struct SqliteSyncMetaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncMetaRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SyncMetaRepository for SqliteSyncMetaRepository<'_> {
    fn last_pull(&self) -> Result<i64> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM sync_meta WHERE key = ?",
                params![LAST_PULL_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.and_then(|value| value.parse().ok()).unwrap_or(0))
    }

    fn set_last_pull(&self, timestamp: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)",
            params![LAST_PULL_KEY, timestamp.to_string()],
        )?;
        Ok(())
    }
}
