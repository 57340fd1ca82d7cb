//! ireport-core - Core library for iReport
//!
//! This crate contains the shared models, local durable store, and cloud
//! contracts used by both iReport clients (the citizen reporter app and the
//! agency review console).

pub mod cloud;
pub mod db;
pub mod error;
pub mod models;
pub mod net;
pub mod services;
pub mod storage;
pub mod util;

pub use error::{Error, Result};
pub use models::{Incident, IncidentId, IncidentStatus};
