//! Data models for iReport

mod history;
mod incident;
mod outbound;
mod submission;

pub use history::StatusHistoryEntry;
pub use incident::{AgencyType, Incident, IncidentId, IncidentStatus};
pub use outbound::{ChangeAction, OutboundChange};
pub use submission::{QueuedSubmission, SubmissionId, SubmissionPayload};
