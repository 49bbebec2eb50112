//! Blockchain dependency subsystem.
//!
//! # Data Flow
//! ```text
//! DependencyConfig (primary + failover URLs)
//!     → client.rs ChainClient (alloy HTTP providers, timeouts, token bucket)
//!     → DependencyProbe   (health, operation failures) → Observer / Tier0
//!     → DependencyControl (switch_endpoint)            → Recoverer
//! ```
//!
//! # Constraints
//! - Read-only: no keys, no signing, no submission
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when the dependency is unreachable

pub mod client;
pub mod types;

pub use client::ChainClient;
pub use types::{
    DependencyControl, DependencyError, DependencyErrorKind, DependencyHealth, DependencyProbe,
};
