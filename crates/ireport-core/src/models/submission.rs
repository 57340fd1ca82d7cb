//! Offline capture queue model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::AgencyType;
use crate::util::now_ms;

/// A unique identifier for a queued submission, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    /// Create a new unique submission ID using UUID v7
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

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubmissionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Everything needed to recreate an incident report once connectivity
/// returns: form data, coordinates, and local media file references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    /// Agency the report is filed with
    pub agency_type: AgencyType,
    /// Authenticated reporter id, if any
    pub reporter_id: Option<String>,
    /// Reporter-provided name
    pub reporter_name: Option<String>,
    /// Reporter-provided age
    pub reporter_age: Option<i64>,
    /// Free-text description
    pub description: String,
    /// GPS latitude
    pub latitude: f64,
    /// GPS longitude
    pub longitude: f64,
    /// Reverse-geocoded address
    pub address: String,
    /// Local filesystem paths of captured media, uploaded at replay time
    pub media_paths: Vec<String>,
}

/// A persisted offline submission awaiting replay.
///
/// Created when a submission cannot reach the cloud; removed only after the
/// incident record insert succeeds. Items at the retry ceiling stay queued
/// and are skipped by replay so the failure can be surfaced to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedSubmission {
    /// Unique queue item id
    pub id: SubmissionId,
    /// The captured report
    pub payload: SubmissionPayload,
    /// When the report was captured (Unix ms); becomes the incident's
    /// `created_at` when replayed
    pub created_at: i64,
    /// Failed replay attempts so far
    pub retry_count: i64,
}

impl QueuedSubmission {
    /// Wrap a payload as a fresh queue item.
    #[must_use]
    pub fn new(payload: SubmissionPayload) -> Self {
        Self {
            id: SubmissionId::new(),
            payload,
            created_at: now_ms(),
            retry_count: 0,
        }
    }
}
