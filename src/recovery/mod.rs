//! Recovery subsystem.
//!
//! # Data Flow
//! ```text
//! Incident
//!     → recoverer.rs plan()     (closed action set, restart cap via attempts.rs)
//!     → RecoveryPlan (plan.rs)
//!     → recoverer.rs execute()
//!         RestartProcess: backoff → control.rs methods in order → first success wins
//!         Switch/Cooldown: circuit breaker gate → dependency control / wait
//!     → RecoveryResult
//! ```
//!
//! # Safety Constraints
//! - No signing, no fund movement, no secret handling
//! - requires_human plans are never executed

pub mod attempts;
pub mod control;
pub mod plan;
pub mod recoverer;

pub use control::{RestartMethod, RestartTarget, ServiceControl, SystemServiceControl};
pub use plan::{
    PlanParameters, RecoveryAction, RecoveryExecutionError, RecoveryPlan, RecoveryResult,
    RecoveryStatus,
};
pub use recoverer::Recoverer;
