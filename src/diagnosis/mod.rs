//! Incident classification subsystem.
//!
//! # Data Flow
//! ```text
//! SystemStatus
//!     → diagnoser.rs (per subject: process, endpoint, operations; then dependency)
//!     → Vec<Incident> (incident.rs), ordered, immutable
//! ```
//!
//! # Design Decisions
//! - Pure classification apart from id issuance
//! - Indeterminate probe results never produce incidents
//! - Endpoint high latency is always Warning

pub mod diagnoser;
pub mod incident;

pub use diagnoser::Diagnoser;
pub use incident::{Incident, IncidentId, IncidentType, Severity};
