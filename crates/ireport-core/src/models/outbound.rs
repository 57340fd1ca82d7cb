//! Outbound change queue model

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of change queued for push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

impl ChangeAction {
    /// Wire/storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ChangeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("Unknown change action: {other}")),
        }
    }
}

impl ToSql for ChangeAction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ChangeAction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// A locally queued edit awaiting transmission to the cloud.
///
/// Deleted on successful push. After [`crate::db::MAX_PUSH_ATTEMPTS`]
/// consecutive failures the row moves to the dead-letter table instead of
/// being retried again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundChange {
    /// Local queue row id
    pub id: i64,
    /// Table the change targets (e.g. `incidents`)
    pub table_name: String,
    /// Primary key of the changed record
    pub record_id: String,
    /// What kind of change this is
    pub action: ChangeAction,
    /// When the change was queued (Unix ms)
    pub created_at: i64,
    /// Consecutive failed push attempts
    pub attempts: i64,
    /// Most recent push error, if any
    pub last_error: Option<String>,
}
