//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracing.rs (cycle spans with correlation IDs)
//!
//! Cycle outputs (snapshot, incidents, recoveries, verifications):
//!     → sink.rs (EventSink) → metrics + in-memory summary tallies
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape, via the `prometheus` extension)
//!     → Admin API (`/admin/metrics` summary)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - `cycle_id` flows through every event of a full cycle
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
pub mod sink;
pub mod tracing;

pub use sink::{EventSink, MetricsSink, MetricsSummary};
