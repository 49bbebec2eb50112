//! Diagnoser: `SystemStatus` → ordered incidents.
//!
//! Classification is deterministic; only ids and timestamps differ between runs.
//! Incidents are ordered subject by subject (sorted by name), then the dependency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde_json::json;

use crate::blockchain::types::{DependencyErrorKind, DependencyHealth};
use crate::config::ProbeConfig;
use crate::diagnosis::incident::{Incident, IncidentId, IncidentType, Severity};
use crate::health::types::{HealthCheckResult, Observation, SystemStatus};

/// Issues incident ids and classifies snapshots.
#[derive(Debug, Default)]
pub struct Diagnoser {
    counter: AtomicU64,
}

struct Draft {
    incident_type: IncidentType,
    severity: Severity,
    subject: Option<String>,
    description: String,
    evidence: BTreeMap<String, serde_json::Value>,
    suggested_actions: &'static [&'static str],
    requires_human: bool,
}

impl Diagnoser {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&self, draft: Draft) -> Incident {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Utc::now();
        Incident {
            id: IncidentId::new(seq, now),
            incident_type: draft.incident_type,
            severity: draft.severity,
            subject: draft.subject,
            description: draft.description,
            evidence: draft.evidence,
            suggested_actions: draft.suggested_actions.iter().map(|s| s.to_string()).collect(),
            requires_human: draft.requires_human,
            detected_at: now,
        }
    }

    /// Classify a full snapshot.
    pub fn analyze(&self, status: &SystemStatus, thresholds: &ProbeConfig) -> Vec<Incident> {
        let mut drafts = Vec::new();
        for result in status.subjects.values() {
            diagnose_subject(result, thresholds, &mut drafts);
        }
        diagnose_dependency(&status.dependency, thresholds, &mut drafts);

        drafts.into_iter().map(|d| self.issue(d)).collect()
    }
}

fn evidence<const N: usize>(pairs: [(&str, serde_json::Value); N]) -> BTreeMap<String, serde_json::Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn diagnose_subject(result: &HealthCheckResult, thresholds: &ProbeConfig, out: &mut Vec<Draft>) {
    let name = &result.subject;

    if let Some(Observation::Confirmed(process)) = &result.process {
        if !process.running {
            out.push(Draft {
                incident_type: IncidentType::ProcessCrash,
                severity: Severity::Critical,
                subject: Some(name.clone()),
                description: format!("Agent '{}' process is not running", name),
                evidence: evidence([("process_check", json!(process))]),
                suggested_actions: &[
                    "Restart the agent process",
                    "Check system logs for crash reason",
                    "Verify sufficient system resources",
                ],
                requires_human: false,
            });
        }
    }

    if let Some(endpoint) = &result.endpoint {
        if !endpoint.healthy {
            let (incident_type, description) = if endpoint.timed_out() {
                (
                    IncidentType::ProcessHang,
                    format!("Agent '{}' health endpoint timed out (possible hang)", name),
                )
            } else {
                let reason = match (&endpoint.error, endpoint.status_code) {
                    (Some(e), _) => e.to_string(),
                    (None, Some(code)) => format!("HTTP {}", code),
                    (None, None) => "no response".to_string(),
                };
                (
                    IncidentType::EndpointFailure,
                    format!("Agent '{}' health endpoint failed: {}", name, reason),
                )
            };
            out.push(Draft {
                incident_type,
                severity: Severity::Critical,
                subject: Some(name.clone()),
                description,
                evidence: evidence([("health_endpoint", json!(endpoint))]),
                suggested_actions: &[
                    "Check agent logs for errors",
                    "Restart if unresponsive",
                    "Verify network connectivity",
                ],
                requires_human: false,
            });
        } else if endpoint.latency_ms > thresholds.endpoint_latency_ms {
            out.push(Draft {
                incident_type: IncidentType::HighLatency,
                severity: Severity::Warning,
                subject: Some(name.clone()),
                description: format!(
                    "Agent '{}' responding slowly ({:.0}ms)",
                    name, endpoint.latency_ms
                ),
                evidence: evidence([("latency_ms", json!(endpoint.latency_ms))]),
                suggested_actions: &[
                    "Monitor for further degradation",
                    "Check system resource usage",
                    "Consider restart if persists",
                ],
                requires_human: false,
            });
        }
    }

    let failures = result.operation_failures();
    if !failures.is_empty() {
        out.push(Draft {
            incident_type: IncidentType::OperationFailures,
            severity: Severity::Warning,
            subject: Some(name.clone()),
            description: format!("Agent '{}' has {} failed operations", name, failures.len()),
            evidence: evidence([("failures", json!(failures))]),
            suggested_actions: &[
                "Investigate operation failure reasons",
                "Check operator account balance",
                "Check for dependency issues",
            ],
            requires_human: true,
        });
    }
}

fn diagnose_dependency(dependency: &DependencyHealth, thresholds: &ProbeConfig, out: &mut Vec<Draft>) {
    if !dependency.healthy {
        let error = dependency.error.as_deref().unwrap_or("Unknown error");
        let (incident_type, description, suggested_actions): (_, _, &'static [&'static str]) =
            match DependencyErrorKind::classify(error) {
                DependencyErrorKind::RateLimited => (
                    IncidentType::DependencyRateLimited,
                    "Dependency RPC rate limited".to_string(),
                    &[
                        "Apply cooldown period",
                        "Switch to backup RPC endpoint",
                        "Reduce request frequency",
                    ],
                ),
                DependencyErrorKind::Unavailable => (
                    IncidentType::DependencyUnavailable,
                    format!("Dependency RPC unavailable: {}", error),
                    &[
                        "Switch to backup RPC endpoint",
                        "Wait and retry",
                        "Check network status",
                    ],
                ),
            };
        out.push(Draft {
            incident_type,
            severity: Severity::Critical,
            subject: None,
            description,
            evidence: evidence([("dependency", json!(dependency))]),
            suggested_actions,
            requires_human: false,
        });
    } else if dependency.latency_ms > thresholds.dependency_latency_ms {
        out.push(Draft {
            incident_type: IncidentType::HighLatency,
            severity: Severity::Warning,
            subject: None,
            description: format!("Dependency RPC high latency ({:.0}ms)", dependency.latency_ms),
            evidence: evidence([("latency_ms", json!(dependency.latency_ms))]),
            suggested_actions: &[
                "Monitor for further degradation",
                "Consider switching RPC endpoint",
            ],
            requires_human: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::types::{EndpointCheck, OperationFailure, ProbeError, ProcessCheck};
    use std::time::Duration;

    fn status(subjects: Vec<HealthCheckResult>, dependency: DependencyHealth) -> SystemStatus {
        SystemStatus::new(
            subjects.into_iter().map(|r| (r.subject.clone(), r)).collect(),
            dependency,
        )
    }

    fn healthy_dep() -> DependencyHealth {
        DependencyHealth::healthy("http://rpc", 100, 50.0)
    }

    fn process(running: bool) -> Option<Observation<ProcessCheck>> {
        Some(Observation::Confirmed(ProcessCheck {
            running,
            method: None,
        }))
    }

    fn endpoint(healthy: bool, latency_ms: f64, error: Option<ProbeError>) -> Option<EndpointCheck> {
        Some(EndpointCheck {
            healthy,
            status_code: if error.is_some() { None } else { Some(if healthy { 200 } else { 503 }) },
            latency_ms,
            error,
        })
    }

    fn subject(
        name: &str,
        p: Option<Observation<ProcessCheck>>,
        e: Option<EndpointCheck>,
        ops: Option<Observation<Vec<OperationFailure>>>,
    ) -> HealthCheckResult {
        HealthCheckResult::new(name, p, e, ops, 5000.0)
    }

    #[test]
    fn test_fully_healthy_yields_nothing() {
        let s = status(
            vec![
                subject("a", process(true), endpoint(true, 20.0, None), Some(Observation::Confirmed(vec![]))),
                subject("b", process(true), None, None),
            ],
            healthy_dep(),
        );
        assert!(s.is_all_healthy());
        assert!(Diagnoser::new().analyze(&s, &ProbeConfig::default()).is_empty());
    }

    #[test]
    fn test_crash_yields_exactly_one_incident() {
        let s = status(vec![subject("svc-A", process(false), None, None)], healthy_dep());
        let incidents = Diagnoser::new().analyze(&s, &ProbeConfig::default());

        assert_eq!(incidents.len(), 1);
        let i = &incidents[0];
        assert_eq!(i.incident_type, IncidentType::ProcessCrash);
        assert_eq!(i.severity, Severity::Critical);
        assert!(!i.requires_human);
        assert_eq!(i.subject.as_deref(), Some("svc-A"));
    }

    #[test]
    fn test_endpoint_timeout_is_hang_and_other_failure_is_endpoint_failure() {
        let s = status(
            vec![
                subject("hung", None, endpoint(false, 10_000.0, Some(ProbeError::Timeout(Duration::from_secs(10)))), None),
                subject("down", None, endpoint(false, 3.0, None), None),
            ],
            healthy_dep(),
        );
        let incidents = Diagnoser::new().analyze(&s, &ProbeConfig::default());

        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].subject.as_deref(), Some("down"));
        assert_eq!(incidents[0].incident_type, IncidentType::EndpointFailure);
        assert_eq!(incidents[1].incident_type, IncidentType::ProcessHang);
        assert!(incidents.iter().all(|i| i.severity == Severity::Critical));
    }

    #[test]
    fn test_slow_endpoint_is_warning() {
        let s = status(vec![subject("slow", None, endpoint(true, 5001.0, None), None)], healthy_dep());
        let incidents = Diagnoser::new().analyze(&s, &ProbeConfig::default());
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].incident_type, IncidentType::HighLatency);
        assert_eq!(incidents[0].severity, Severity::Warning);
    }

    #[test]
    fn test_operation_failures_require_human() {
        let failure = OperationFailure {
            tx_hash: "0xabc".to_string(),
            block: Some(9),
            error: "reverted".to_string(),
        };
        let s = status(
            vec![subject("ops", None, None, Some(Observation::Confirmed(vec![failure])))],
            healthy_dep(),
        );
        let incidents = Diagnoser::new().analyze(&s, &ProbeConfig::default());
        assert_eq!(incidents[0].incident_type, IncidentType::OperationFailures);
        assert_eq!(incidents[0].severity, Severity::Warning);
        assert!(incidents[0].requires_human);
    }

    #[test]
    fn test_indeterminate_probes_yield_nothing() {
        let s = status(
            vec![subject(
                "unknown",
                Some(Observation::Indeterminate(ProbeError::Failed("no systemctl".into()))),
                None,
                Some(Observation::Indeterminate(ProbeError::Timeout(Duration::from_secs(10)))),
            )],
            healthy_dep(),
        );
        assert!(Diagnoser::new().analyze(&s, &ProbeConfig::default()).is_empty());
    }

    #[test]
    fn test_dependency_classification() {
        let d = Diagnoser::new();
        let limited = status(vec![], DependencyHealth::unhealthy("http://rpc", 10.0, "HTTP 429 Too Many Requests"));
        let down = status(vec![], DependencyHealth::unhealthy("http://rpc", 10.0, "connection refused"));
        let slow = status(vec![], DependencyHealth::healthy("http://rpc", 1, 2500.0));

        let i = d.analyze(&limited, &ProbeConfig::default());
        assert_eq!(i[0].incident_type, IncidentType::DependencyRateLimited);
        assert_eq!(i[0].severity, Severity::Critical);
        assert!(i[0].subject.is_none());

        let i = d.analyze(&down, &ProbeConfig::default());
        assert_eq!(i[0].incident_type, IncidentType::DependencyUnavailable);

        let i = d.analyze(&slow, &ProbeConfig::default());
        assert_eq!(i[0].incident_type, IncidentType::HighLatency);
        assert_eq!(i[0].severity, Severity::Warning);
        assert!(i[0].subject.is_none());
    }

    #[test]
    fn test_ids_are_monotonic() {
        let d = Diagnoser::new();
        let s = status(vec![], DependencyHealth::unhealthy("http://rpc", 10.0, "down"));
        let first = d.analyze(&s, &ProbeConfig::default());
        let second = d.analyze(&s, &ProbeConfig::default());
        assert!(first[0].id < second[0].id);
    }
}
