//! Incident types.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique, monotonically ordered incident identifier.
///
/// Ordering and equality use the sequence number only; the timestamp is for display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IncidentId {
    seq: u64,
    issued_at: DateTime<Utc>,
}

impl IncidentId {
    pub fn new(seq: u64, issued_at: DateTime<Utc>) -> Self {
        Self { seq, issued_at }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl PartialEq for IncidentId {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for IncidentId {}

impl PartialOrd for IncidentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IncidentId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq.cmp(&other.seq)
    }
}

impl std::hash::Hash for IncidentId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.seq.hash(state);
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INC-{}-{:04}", self.issued_at.format("%Y%m%d%H%M%S"), self.seq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    ProcessCrash,
    ProcessHang,
    EndpointFailure,
    HighLatency,
    OperationFailures,
    DependencyRateLimited,
    DependencyUnavailable,
}

impl IncidentType {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentType::ProcessCrash => "process_crash",
            IncidentType::ProcessHang => "process_hang",
            IncidentType::EndpointFailure => "endpoint_failure",
            IncidentType::HighLatency => "high_latency",
            IncidentType::OperationFailures => "operation_failures",
            IncidentType::DependencyRateLimited => "dependency_rate_limited",
            IncidentType::DependencyUnavailable => "dependency_unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// A diagnosed abnormal condition. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub incident_type: IncidentType,
    pub severity: Severity,
    /// Agent name, or `None` for system-wide incidents.
    pub subject: Option<String>,
    pub description: String,
    pub evidence: BTreeMap<String, serde_json::Value>,
    pub suggested_actions: Vec<String>,
    pub requires_human: bool,
    pub detected_at: DateTime<Utc>,
}

impl Incident {
    pub fn subject_label(&self) -> &str {
        self.subject.as_deref().unwrap_or("system")
    }
}
