//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors at once)
//!     → MonitorConfig (validated)
//!     → SharedConfig (Arc<ArcSwap<_>>) handed to collaborators
//!
//! On file change (config-watcher extension):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap; collaborators read the new value at next use
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Invalid reloads are logged and ignored

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AdvisoryConfig, AgentConfig, CircuitBreakerConfig, DependencyConfig,
    MonitorConfig, NotifierConfig, ObservabilityConfig, ProbeConfig, QuarantineConfig,
    RecoveryConfig, SchedulerConfig, VerificationConfig,
};
pub use watcher::{shared, startup_only_changes, SharedConfig};
