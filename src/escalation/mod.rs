//! Tiered escalation.
//!
//! # Data Flow
//! ```text
//! every tick ──▶ Tier0 (tier0.rs): host load, memory, dependency stall,
//!                verified quarantine signals, sweep incidents
//!                   │ alert
//!                   ▼
//!                Tier1 (advisory.rs): external verdict, fails safe to escalate
//!                   │ escalate
//!                   ▼
//!                Tier2 (cycle.rs): Observer → Diagnoser → Recoverer → Verifier
//!
//! interval.rs paces the status-only sweeps (default / incident / stable)
//! scheduler.rs owns the loop, the rate-limit windows and the published snapshot
//! ```
//!
//! # Design Decisions
//! - The scheduler is the only mutator of its windows and interval state
//! - Full cycles are single-flight
//! - A failed cycle never stops the loop

pub mod advisory;
pub mod cycle;
pub mod interval;
pub mod scheduler;
pub mod tier0;

pub use advisory::{
    consult, Advisory, AdvisoryAction, AdvisoryError, AdvisoryRequest, AdvisorySeverity,
    AdvisoryVerdict, HttpAdvisory,
};
pub use cycle::{CycleError, CycleReport, CycleRunner, MonitorCycle};
pub use interval::{IntervalState, IntervalTracker};
pub use scheduler::{
    CycleSummary, EscalationScheduler, SchedulerSnapshot, SnapshotHandle, TickOutcome,
};
pub use tier0::{is_stalled, HostMetrics, HostSample, SysinfoHost, Tier0Monitor, Tier0Report};
