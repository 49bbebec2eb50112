//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build collaborators → Start extensions → Start loops
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Scheduler stops between ticks → Admin API drains → Extensions stop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - In-flight probes and commands run to their own timeouts, never killed mid-call

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{load_or_default, ConfigSource, Medic, StartupError};
