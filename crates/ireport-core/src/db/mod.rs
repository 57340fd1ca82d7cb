//! Local durable store for iReport clients

mod connection;
mod history;
mod meta;
mod migrations;
mod mirror;
mod offline_queue;
mod outbound;

pub use connection::Database;
pub use history::{SqliteStatusHistoryRepository, StatusHistoryRepository};
pub use meta::{SqliteSyncMetaRepository, SyncMetaRepository};
pub use mirror::{
    IncidentFilter, IncidentMirrorRepository, MergeOutcome, MirrorStats,
    SqliteIncidentMirrorRepository,
};
pub use offline_queue::{
    OfflineQueueRepository, SqliteOfflineQueueRepository, MAX_SUBMISSION_RETRIES,
};
pub use outbound::{
    FailureDisposition, OutboundChangeRepository, SqliteOutboundChangeRepository,
    MAX_PUSH_ATTEMPTS,
};
