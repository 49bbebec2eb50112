//! Quarantine for externally supplied signals.
//!
//! Threat feeds, peer incident reports and similar inputs are held here until
//! enough distinct sources corroborate them. Only verified items may influence
//! escalation.

pub mod gate;
pub mod types;

pub use gate::{content_id, QuarantineGate};
pub use types::{DataType, QuarantineError, QuarantineStats, QuarantineStatus, QuarantinedItem};
