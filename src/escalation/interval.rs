//! Adaptive check interval.
//!
//! ```text
//! any incident in the last sweep/cycle        → Incident (short)
//! healthy continuously for >= stable threshold → Stable (long)
//! otherwise                                    → Default
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::SchedulerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalState {
    Default,
    Incident,
    Stable,
}

#[derive(Debug)]
pub struct IntervalTracker {
    state: IntervalState,
    healthy_since: Option<Instant>,
}

impl Default for IntervalTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalTracker {
    pub fn new() -> Self {
        Self {
            state: IntervalState::Default,
            healthy_since: None,
        }
    }

    pub fn state(&self) -> IntervalState {
        self.state
    }

    /// Fold in the incident count of the latest sweep or cycle.
    pub fn update(&mut self, incidents: usize, config: &SchedulerConfig) -> IntervalState {
        let next = if incidents > 0 {
            self.healthy_since = None;
            IntervalState::Incident
        } else {
            let since = *self.healthy_since.get_or_insert_with(Instant::now);
            if since.elapsed() >= Duration::from_secs(config.stable_threshold_mins * 60) {
                IntervalState::Stable
            } else {
                IntervalState::Default
            }
        };

        if next != self.state {
            tracing::info!(from = ?self.state, to = ?next, "Check interval changed");
            self.state = next;
        }
        next
    }

    pub fn interval(&self, config: &SchedulerConfig) -> Duration {
        Duration::from_secs(match self.state {
            IntervalState::Default => config.default_interval_secs,
            IntervalState::Incident => config.incident_interval_secs,
            IntervalState::Stable => config.stable_interval_secs,
        })
    }
}
