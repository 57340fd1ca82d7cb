//! Shared database service wrapper used across clients.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::db::Database;
use crate::error::Result;

/// Thread-safe handle to a client's local store.
///
/// All store access is synchronous and fast; callers must not hold the lock
/// across network awaits.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db = Database::open(db_path.into())?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Acquire the store for a batch of synchronous operations.
    pub async fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory_and_lock() {
        let service = DatabaseService::open_in_memory().unwrap();
        let db = service.lock().await;
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clones_share_one_store() {
        let service = DatabaseService::open_in_memory().unwrap();
        let clone = service.clone();

        {
            let db = service.lock().await;
            db.connection()
                .execute(
                    "INSERT INTO sync_meta (key, value) VALUES ('probe', '1')",
                    [],
                )
                .unwrap();
        }

        let db = clone.lock().await;
        let value: String = db
            .connection()
            .query_row(
                "SELECT value FROM sync_meta WHERE key = 'probe'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(value, "1");
    }
}
