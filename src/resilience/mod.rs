//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dependency-targeted recovery action:
//!     → circuit_breaker.rs (can_execute? skip when Open)
//!     → timeouts.rs (every external call has a deadline)
//!     → outcome recorded back on the breaker
//!
//! Outgoing RPC:       rate_limit.rs TokenBucket (wait for a token)
//! Tier1/Tier2 calls:  rate_limit.rs WindowLimiter (skip inside window)
//! Webhook delivery:   retries.rs + backoff.rs (jittered exponential)
//! Restart pacing:     backoff.rs (linear, base × (attempt + 1))
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Breakers live in an explicit registry, never in globals

pub mod backoff;
pub mod circuit_breaker;
pub mod rate_limit;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerState, CircuitState};
pub use rate_limit::{TokenBucket, WindowLimiter};
pub use retries::RetryPolicy;
pub use timeouts::{with_deadline, DeadlineExceeded};
