//! ireport-console - Review console engine for iReport
//!
//! The desktop client's sync core: a local mirror of cloud incident state,
//! an outbound push queue fed by staff edits, the sync manager that runs
//! pull/push/history passes, and the realtime merge handler for the live
//! change feed. The console UI sits on top of this crate and is out of
//! scope here.

pub mod mirror;
pub mod realtime;
pub mod status;
pub mod sync;

#[cfg(test)]
mod testing;

pub use mirror::MirrorService;
pub use realtime::{FeedEvent, RealtimeMerger};
pub use status::{SyncObserver, SyncStatus};
pub use sync::{SyncManager, SyncOutcome, SYNC_INTERVAL};
