//! Health observation subsystem.
//!
//! # Data Flow
//! ```text
//! Observer::observe() (observer.rs):
//!     for each agent, concurrently:
//!         ProcessProbe   (process.rs)   → Observation<ProcessCheck>
//!         EndpointProbe  (endpoint.rs)  → EndpointCheck
//!         DependencyProbe::recent_operation_failures → Observation<Vec<_>>
//!     DependencyProbe::dependency_health (once)
//!     → SystemStatus (types.rs), immutable
//!
//! Lifecycle (lifecycle.rs):
//!     SystemStatus → per-agent AgentState machine
//! ```
//!
//! # Design Decisions
//! - Every probe call is bounded by the probe timeout
//! - A probe that could not answer is Indeterminate, never "down"
//! - Endpoint timeouts are evidence of a hang and stay confirmed data

pub mod endpoint;
pub mod lifecycle;
pub mod observer;
pub mod probe;
pub mod process;
pub mod types;

pub use endpoint::HttpEndpointProbe;
pub use lifecycle::{AgentState, LifecycleTracker};
pub use observer::Observer;
pub use probe::{EndpointProbe, ProcessProbe};
pub use process::SystemProcessProbe;
pub use types::{
    AgentStatus, EndpointCheck, HealthCheckResult, Observation, OperationFailure, ProbeError,
    ProcessCheck, SystemStatus,
};
