//! Health snapshot types.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::types::DependencyHealth;

/// A single probe failure. Localized to one subject; never aborts a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Probe failed: {0}")]
    Failed(String),

    #[error("Probe not configured")]
    NotConfigured,
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout(_))
    }
}

/// Outcome of a probe whose failure must not be mistaken for a negative answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Observation<T> {
    /// The probe answered; the value is the confirmed state.
    Confirmed(T),
    /// The probe could not answer; nothing is known about the subject.
    Indeterminate(ProbeError),
}

impl<T> Observation<T> {
    pub fn confirmed(&self) -> Option<&T> {
        match self {
            Observation::Confirmed(value) => Some(value),
            Observation::Indeterminate(_) => None,
        }
    }
}

/// Overall status of one subject in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Healthy,
    Degraded,
    Failed,
    Unknown,
}

/// Process liveness answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCheck {
    pub running: bool,
    /// Which mechanism found the process (service manager, process table, container).
    pub method: Option<String>,
}

/// HTTP health endpoint answer.
///
/// Endpoint probes always yield a check: a probe error here is evidence about the
/// subject itself (a timeout means the process is hung).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointCheck {
    pub healthy: bool,
    pub status_code: Option<u16>,
    pub latency_ms: f64,
    pub error: Option<ProbeError>,
}

impl EndpointCheck {
    pub fn timed_out(&self) -> bool {
        self.error.as_ref().is_some_and(ProbeError::is_timeout)
    }
}

/// A failed on-chain operation attributed to a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    pub tx_hash: String,
    pub block: Option<u64>,
    pub error: String,
}

/// Result of all checks for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub subject: String,
    pub status: AgentStatus,
    pub process: Option<Observation<ProcessCheck>>,
    pub endpoint: Option<EndpointCheck>,
    pub operations: Option<Observation<Vec<OperationFailure>>>,
    pub errors: Vec<String>,
    pub metrics: BTreeMap<String, f64>,
}

impl HealthCheckResult {
    /// Assemble a result and derive its status from the checks.
    pub fn new(
        subject: impl Into<String>,
        process: Option<Observation<ProcessCheck>>,
        endpoint: Option<EndpointCheck>,
        operations: Option<Observation<Vec<OperationFailure>>>,
        latency_threshold_ms: f64,
    ) -> Self {
        let subject = subject.into();
        let mut errors = Vec::new();
        let mut metrics = BTreeMap::new();
        let mut confirmed_checks = 0;
        let mut process_down = false;
        let mut degraded = false;

        match &process {
            Some(Observation::Confirmed(check)) => {
                confirmed_checks += 1;
                if !check.running {
                    process_down = true;
                    errors.push(format!("Process for '{}' not running", subject));
                }
            }
            Some(Observation::Indeterminate(e)) => {
                errors.push(format!("Process check indeterminate: {}", e));
            }
            None => {}
        }

        if let Some(check) = &endpoint {
            confirmed_checks += 1;
            metrics.insert("endpoint_latency_ms".to_string(), check.latency_ms);
            if !check.healthy {
                degraded = true;
                let reason = match (&check.error, check.status_code) {
                    (Some(e), _) => e.to_string(),
                    (None, Some(code)) => format!("HTTP {}", code),
                    (None, None) => "unknown".to_string(),
                };
                errors.push(format!("Health endpoint unhealthy: {}", reason));
            } else if check.latency_ms > latency_threshold_ms {
                degraded = true;
            }
        }

        match &operations {
            Some(Observation::Confirmed(failures)) => {
                confirmed_checks += 1;
                metrics.insert("operation_failures".to_string(), failures.len() as f64);
                if !failures.is_empty() {
                    degraded = true;
                    errors.push(format!("{} failed operations detected", failures.len()));
                }
            }
            Some(Observation::Indeterminate(e)) => {
                errors.push(format!("Operation check indeterminate: {}", e));
            }
            None => {}
        }

        let status = if process_down {
            AgentStatus::Failed
        } else if confirmed_checks == 0 {
            AgentStatus::Unknown
        } else if degraded || !errors.is_empty() {
            AgentStatus::Degraded
        } else {
            AgentStatus::Healthy
        };

        Self {
            subject,
            status,
            process,
            endpoint,
            operations,
            errors,
            metrics,
        }
    }

    /// Confirmed operation failures, empty when unknown.
    pub fn operation_failures(&self) -> &[OperationFailure] {
        match &self.operations {
            Some(Observation::Confirmed(failures)) => failures,
            _ => &[],
        }
    }
}

/// One consistent snapshot of every subject plus the dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub timestamp: DateTime<Utc>,
    pub subjects: BTreeMap<String, HealthCheckResult>,
    pub dependency: DependencyHealth,
    pub active_incidents: usize,
}

impl SystemStatus {
    pub fn new(
        subjects: BTreeMap<String, HealthCheckResult>,
        dependency: DependencyHealth,
    ) -> Self {
        let mut active_incidents = subjects
            .values()
            .filter(|r| matches!(r.status, AgentStatus::Failed | AgentStatus::Degraded))
            .count();
        if !dependency.healthy {
            active_incidents += 1;
        }

        Self {
            timestamp: Utc::now(),
            subjects,
            dependency,
            active_incidents,
        }
    }

    pub fn is_all_healthy(&self) -> bool {
        self.dependency.healthy
            && self
                .subjects
                .values()
                .all(|r| r.status == AgentStatus::Healthy)
    }

    /// Per-subject status only; used to compare snapshots regardless of latency.
    pub fn status_fields(&self) -> (BTreeMap<&str, AgentStatus>, bool) {
        (
            self.subjects
                .iter()
                .map(|(k, v)| (k.as_str(), v.status))
                .collect(),
            self.dependency.healthy,
        )
    }
}
