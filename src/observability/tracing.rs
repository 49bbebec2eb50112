//! Cycle correlation.
//!
//! Every full cycle gets a UUID v4 `cycle_id`; all events logged inside the
//! cycle carry it through the span.

use tracing::Span;
use uuid::Uuid;

pub fn new_cycle_id() -> Uuid {
    Uuid::new_v4()
}

/// Span wrapping one full Observer → Diagnoser → Recoverer → Verifier cycle.
pub fn cycle_span(cycle_id: Uuid, trigger: &str) -> Span {
    tracing::info_span!("cycle", cycle_id = %cycle_id, trigger = %trigger)
}
