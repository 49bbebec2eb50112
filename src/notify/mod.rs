//! Human alerts.
//!
//! # Data Flow
//! ```text
//! AlertHuman plan / exhausted restarts
//!     → HumanAlert
//!     → AlertRouter (drop repeats of (subject, kind) within the window)
//!     → LogNotifier, WebhookNotifier (background POST with retries)
//! ```
//!
//! # Design Decisions
//! - Delivery is fire-and-forget; the control loop never waits on a webhook
//! - Suppression is keyed on subject and kind, not message text

pub mod alert;
pub mod notifier;
pub mod router;

pub use alert::HumanAlert;
pub use notifier::{HumanNotifier, LogNotifier, WebhookNotifier};
pub use router::AlertRouter;
