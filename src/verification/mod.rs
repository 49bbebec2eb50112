//! Post-action verification.
//!
//! # Data Flow
//! ```text
//! (RecoveryPlan, RecoveryResult)
//!     → Skipped/Failed: verified=false immediately, nothing re-observed
//!     → otherwise: settle delay
//!         RestartProcess          → process liveness + endpoint re-check
//!         Switch / Cooldown       → dependency health re-check (recorded on breaker)
//!     → VerificationResult (verified iff ≥1 check ran and all passed)
//! ```

pub mod verifier;

pub use verifier::{VerificationResult, Verifier};
