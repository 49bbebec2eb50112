//! Recovery plan and result types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::types::DependencyError;
use crate::diagnosis::incident::IncidentId;

/// The closed set of automated actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    RestartProcess,
    SwitchDependencyEndpoint,
    ApplyCooldown,
    AlertHuman,
    NoAction,
}

impl RecoveryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryAction::RestartProcess => "restart_process",
            RecoveryAction::SwitchDependencyEndpoint => "switch_dependency_endpoint",
            RecoveryAction::ApplyCooldown => "apply_cooldown",
            RecoveryAction::AlertHuman => "alert_human",
            RecoveryAction::NoAction => "no_action",
        }
    }

    /// Actions that touch the external dependency and are gated by its breaker.
    pub fn targets_dependency(self) -> bool {
        matches!(
            self,
            RecoveryAction::SwitchDependencyEndpoint | RecoveryAction::ApplyCooldown
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanParameters {
    /// Delay before a restart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_seconds: Option<u64>,

    /// Restarts already made for this subject in the rolling window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,

    /// Kill before restarting (hung process).
    #[serde(default)]
    pub force: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_seconds: Option<u64>,
}

/// An immutable decision for one incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub incident_id: IncidentId,
    pub action: RecoveryAction,
    pub subject: Option<String>,
    pub parameters: PlanParameters,
    pub requires_human: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    Success,
    Partial,
    Failed,
    Skipped,
}

impl RecoveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryStatus::Success => "success",
            RecoveryStatus::Partial => "partial",
            RecoveryStatus::Failed => "failed",
            RecoveryStatus::Skipped => "skipped",
        }
    }
}

/// Outcome of executing one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub incident_id: IncidentId,
    pub action: RecoveryAction,
    pub subject: Option<String>,
    pub status: RecoveryStatus,
    pub duration: Duration,
    pub message: String,
    /// Method that actually performed the action.
    pub method: Option<String>,
    /// Methods attempted, in order.
    pub tried: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl RecoveryResult {
    pub fn new(plan: &RecoveryPlan, status: RecoveryStatus, duration: Duration, message: impl Into<String>) -> Self {
        Self {
            incident_id: plan.incident_id,
            action: plan.action,
            subject: plan.subject.clone(),
            status,
            duration,
            message: message.into(),
            method: None,
            tried: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_tried(mut self, tried: Vec<String>) -> Self {
        self.tried = tried;
        self
    }
}

/// Failure executing a recovery action. Reported, never retried by the recoverer.
#[derive(Debug, Error)]
pub enum RecoveryExecutionError {
    #[error("All restart methods failed (tried: {})", .tried.join(", "))]
    Exhausted { tried: Vec<String> },

    #[error("{method} exited unsuccessfully: {detail}")]
    CommandFailed { method: String, detail: String },

    #[error("Failed to spawn {method}: {detail}")]
    Spawn { method: String, detail: String },

    #[error("{method} timed out after {limit:?}")]
    Timeout { method: String, limit: Duration },

    #[error("Circuit breaker open for '{0}'")]
    BreakerOpen(String),

    #[error(transparent)]
    Dependency(#[from] DependencyError),
}
