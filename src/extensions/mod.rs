//! Extensions: optional components started by name from config.
//!
//! # Data Flow
//! ```text
//! config.extensions ["prometheus", "config-watcher", ...]
//!     → ExtensionRegistry (name → factory)
//!     → initialize() in listed order
//!     → shutdown() in reverse order
//! ```
//!
//! # Design Decisions
//! - Fixed two-method interface, resolved through an explicit registry
//! - Unknown or duplicate names fail startup

pub mod builtin;
pub mod registry;

pub use builtin::{ConfigWatcherExtension, PrometheusExtension};
pub use registry::{
    Extension, ExtensionContext, ExtensionError, ExtensionFactory, ExtensionRegistry,
    RunningExtensions,
};
