//! Autonomous health monitor and recovery controller for blockchain agents.

pub mod config;
pub mod health;
pub mod blockchain;
pub mod diagnosis;
pub mod recovery;
pub mod verification;
pub mod escalation;
pub mod quarantine;
pub mod resilience;
pub mod notify;
pub mod lifecycle;
pub mod observability;
pub mod admin;
pub mod extensions;

pub use config::schema::MonitorConfig;
pub use escalation::{EscalationScheduler, MonitorCycle};
pub use lifecycle::{Medic, Shutdown};
