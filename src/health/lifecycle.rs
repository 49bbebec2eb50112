//! Agent lifecycle state machine.
//!
//! # States
//! Unknown, Starting, Healthy, Degraded, Recovering, Failed, Stopped
//!
//! # State Transitions
//! ```text
//! Unknown    → Starting | Healthy | Failed
//! Starting   → Healthy | Failed
//! Healthy    → Degraded | Failed | Stopped
//! Degraded   → Healthy | Recovering | Failed
//! Recovering → Healthy | Degraded | Failed
//! Failed     → Recovering | Stopped
//! Stopped    → Starting
//! ```
//!
//! # Design Decisions
//! - Observed snapshots drive the machine; the recoverer marks Recovering
//! - Transitions outside the table are rejected and logged, the state is kept
//! - An observed return from Failed (restarted outside the medic) is recorded
//!   as Failed → Recovering → Healthy/Degraded

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::health::types::{AgentStatus, SystemStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Unknown,
    Starting,
    Healthy,
    Degraded,
    Recovering,
    Failed,
    Stopped,
}

impl AgentState {
    /// States reachable in one step.
    pub fn allowed_next(self) -> &'static [AgentState] {
        use AgentState::*;
        match self {
            Unknown => &[Starting, Healthy, Failed],
            Starting => &[Healthy, Failed],
            Healthy => &[Degraded, Failed, Stopped],
            Degraded => &[Healthy, Recovering, Failed],
            Recovering => &[Healthy, Degraded, Failed],
            Failed => &[Recovering, Stopped],
            Stopped => &[Starting],
        }
    }

    pub fn can_transition(self, next: AgentState) -> bool {
        self.allowed_next().contains(&next)
    }

    fn from_observed(status: AgentStatus) -> Option<Self> {
        match status {
            AgentStatus::Healthy => Some(AgentState::Healthy),
            AgentStatus::Degraded => Some(AgentState::Degraded),
            AgentStatus::Failed => Some(AgentState::Failed),
            AgentStatus::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChange {
    pub from: AgentState,
    pub to: AgentState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Machine {
    state: AgentState,
    history: Vec<StateChange>,
}

const HISTORY_LIMIT: usize = 50;

/// Per-subject lifecycle machines.
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    machines: DashMap<String, Machine>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, subject: &str) -> AgentState {
        self.machines
            .get(subject)
            .map(|m| m.state)
            .unwrap_or(AgentState::Unknown)
    }

    /// Attempt one transition. Returns false (and keeps the state) if the table forbids it.
    pub fn transition(&self, subject: &str, next: AgentState) -> bool {
        let mut machine = self.machines.entry(subject.to_string()).or_insert_with(|| Machine {
            state: AgentState::Unknown,
            history: Vec::new(),
        });

        let current = machine.state;
        if current == next {
            return true;
        }
        if !current.can_transition(next) {
            tracing::debug!(subject, from = ?current, to = ?next, "Rejected lifecycle transition");
            return false;
        }

        machine.state = next;
        machine.history.push(StateChange {
            from: current,
            to: next,
            at: Utc::now(),
        });
        if machine.history.len() > HISTORY_LIMIT {
            machine.history.remove(0);
        }
        tracing::info!(subject, from = ?current, to = ?next, "Agent state changed");
        true
    }

    pub fn mark_recovering(&self, subject: &str) -> bool {
        self.transition(subject, AgentState::Recovering)
    }

    /// Feed one snapshot into every subject's machine.
    pub fn observe(&self, status: &SystemStatus) {
        for (subject, result) in &status.subjects {
            if let Some(next) = AgentState::from_observed(result.status) {
                self.observe_state(subject, next);
            }
        }
    }

    /// Move to an observed state, passing through Recovering when the table
    /// only reaches it that way.
    pub fn observe_state(&self, subject: &str, next: AgentState) -> bool {
        let current = self.state(subject);
        if current != next
            && !current.can_transition(next)
            && current.can_transition(AgentState::Recovering)
            && AgentState::Recovering.can_transition(next)
        {
            tracing::info!(subject, from = ?current, to = ?next, "Agent recovered outside the medic");
            return self.mark_recovering(subject) && self.transition(subject, next);
        }
        self.transition(subject, next)
    }

    pub fn states(&self) -> BTreeMap<String, AgentState> {
        self.machines
            .iter()
            .map(|m| (m.key().clone(), m.state))
            .collect()
    }

    pub fn history(&self, subject: &str) -> Vec<StateChange> {
        self.machines
            .get(subject)
            .map(|m| m.history.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_transitions() {
        let tracker = LifecycleTracker::new();
        assert!(tracker.transition("a", AgentState::Healthy));
        assert!(tracker.transition("a", AgentState::Failed));
        assert!(!tracker.transition("a", AgentState::Healthy));
        assert_eq!(tracker.state("a"), AgentState::Failed);

        assert!(tracker.mark_recovering("a"));
        assert!(tracker.transition("a", AgentState::Healthy));
        assert_eq!(tracker.history("a").len(), 4);
    }

    #[test]
    fn test_observed_return_from_failed_steps_through_recovering() {
        let tracker = LifecycleTracker::new();
        assert!(tracker.observe_state("a", AgentState::Failed));
        assert!(tracker.observe_state("a", AgentState::Healthy));
        assert_eq!(tracker.state("a"), AgentState::Healthy);

        let path: Vec<_> = tracker.history("a").iter().map(|c| c.to).collect();
        assert_eq!(path, vec![AgentState::Failed, AgentState::Recovering, AgentState::Healthy]);

        // Stopped has no route through Recovering.
        assert!(tracker.transition("b", AgentState::Healthy));
        assert!(tracker.transition("b", AgentState::Stopped));
        assert!(!tracker.observe_state("b", AgentState::Healthy));
        assert_eq!(tracker.state("b"), AgentState::Stopped);
    }

    #[test]
    fn test_unknown_subject_defaults() {
        let tracker = LifecycleTracker::new();
        assert_eq!(tracker.state("missing"), AgentState::Unknown);
        assert!(!tracker.transition("missing", AgentState::Recovering));
    }

    #[test]
    fn test_every_state_has_an_exit() {
        use AgentState::*;
        for state in [Unknown, Starting, Healthy, Degraded, Recovering, Failed, Stopped] {
            assert!(!state.allowed_next().is_empty());
            assert!(!state.can_transition(state));
        }
    }
}
