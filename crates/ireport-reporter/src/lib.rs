//! ireport-reporter - Citizen reporter engine for iReport
//!
//! The mobile client's sync core: the durable offline capture queue, its
//! sequential replay engine, and the direct submission path with offline
//! fallback. The capture UI sits on top of this crate and is out of scope
//! here.

pub mod queue;
pub mod submit;

#[cfg(test)]
mod testing;

pub use queue::{NoopObserver, OfflineQueue, ReplayObserver, ReplayReport};
pub use submit::{SubmissionOutcome, Submitter};
