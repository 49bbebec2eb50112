//! Event sink for cycle outputs.
//!
//! Every snapshot, incident, recovery and verification produced by a cycle is
//! handed to an `EventSink`. `MetricsSink` exports them as metrics and keeps the
//! in-memory tallies behind the summary figures (uptime, recovery success rate,
//! MTTR, false-positive rate). Nothing here is persisted.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnosis::incident::Incident;
use crate::health::types::SystemStatus;
use crate::observability::metrics;
use crate::recovery::plan::RecoveryResult;
use crate::verification::VerificationResult;

const MTTR_SAMPLES: usize = 100;
const TRACKED_INCIDENTS: usize = 1000;

pub trait EventSink: Send + Sync {
    fn record_status(&self, status: &SystemStatus);
    fn record_incident(&self, incident: &Incident);
    fn record_recovery(&self, result: &RecoveryResult);
    fn record_verification(&self, verification: &VerificationResult);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub started_at: DateTime<Utc>,
    pub total_checks: u64,
    pub uptime_percent: f64,
    pub total_incidents: u64,
    pub total_recoveries: u64,
    pub recovery_success_rate: f64,
    pub mttr_seconds: f64,
    pub false_positive_rate: f64,
}

#[derive(Debug, Default)]
struct Tallies {
    total_checks: u64,
    healthy_checks: u64,
    total_incidents: u64,
    total_recoveries: u64,
    verified_recoveries: u64,
    false_positives: u64,
    mttr_samples: VecDeque<f64>,
    /// Detection time of recent incidents, keyed by display id.
    open: BTreeMap<String, DateTime<Utc>>,
    seen: VecDeque<String>,
    marked_false: BTreeSet<String>,
}

#[derive(Debug)]
pub struct MetricsSink {
    started_at: DateTime<Utc>,
    tallies: Mutex<Tallies>,
}

impl Default for MetricsSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            tallies: Mutex::new(Tallies::default()),
        }
    }

    /// Record that an incident turned out not to be real.
    ///
    /// Returns false for ids never seen (or already marked).
    pub fn mark_false_positive(&self, incident_id: &str) -> bool {
        let Ok(mut t) = self.tallies.lock() else {
            return false;
        };
        if !t.seen.iter().any(|id| id == incident_id) || t.marked_false.contains(incident_id) {
            return false;
        }
        t.marked_false.insert(incident_id.to_string());
        t.open.remove(incident_id);
        t.false_positives += 1;
        tracing::info!(incident_id = %incident_id, "Incident marked as false positive");
        true
    }

    pub fn summary(&self) -> MetricsSummary {
        let t = match self.tallies.lock() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        };
        let percent = |num: u64, den: u64, empty: f64| {
            if den == 0 {
                empty
            } else {
                round2(num as f64 / den as f64 * 100.0)
            }
        };
        let mttr = if t.mttr_samples.is_empty() {
            0.0
        } else {
            round2(t.mttr_samples.iter().sum::<f64>() / t.mttr_samples.len() as f64)
        };

        MetricsSummary {
            started_at: self.started_at,
            total_checks: t.total_checks,
            uptime_percent: percent(t.healthy_checks, t.total_checks, 100.0),
            total_incidents: t.total_incidents,
            total_recoveries: t.total_recoveries,
            recovery_success_rate: percent(t.verified_recoveries, t.total_recoveries, 100.0),
            mttr_seconds: mttr,
            false_positive_rate: percent(t.false_positives, t.total_incidents, 0.0),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl EventSink for MetricsSink {
    fn record_status(&self, status: &SystemStatus) {
        for result in status.subjects.values() {
            metrics::record_check(&result.subject, result.status);
        }
        if let Ok(mut t) = self.tallies.lock() {
            t.total_checks += 1;
            if status.active_incidents == 0 {
                t.healthy_checks += 1;
            }
        }
    }

    fn record_incident(&self, incident: &Incident) {
        metrics::record_incident(incident);
        tracing::warn!(
            incident_id = %incident.id,
            incident_type = incident.incident_type.as_str(),
            severity = incident.severity.as_str(),
            subject = %incident.subject_label(),
            requires_human = incident.requires_human,
            "{}",
            incident.description
        );

        if let Ok(mut t) = self.tallies.lock() {
            let id = incident.id.to_string();
            t.total_incidents += 1;
            t.open.insert(id.clone(), incident.detected_at);
            t.seen.push_back(id);
            while t.seen.len() > TRACKED_INCIDENTS {
                if let Some(old) = t.seen.pop_front() {
                    t.open.remove(&old);
                    t.marked_false.remove(&old);
                }
            }
        }
    }

    fn record_recovery(&self, result: &RecoveryResult) {
        metrics::record_recovery(result);
        tracing::info!(
            incident_id = %result.incident_id,
            action = result.action.as_str(),
            status = result.status.as_str(),
            method = result.method.as_deref().unwrap_or("-"),
            duration_ms = result.duration.as_millis() as u64,
            "{}",
            result.message
        );
        if let Ok(mut t) = self.tallies.lock() {
            t.total_recoveries += 1;
        }
    }

    fn record_verification(&self, verification: &VerificationResult) {
        metrics::record_verification(verification.verified);
        if let Ok(mut t) = self.tallies.lock() {
            let id = verification.incident_id.to_string();
            let detected = t.open.remove(&id);
            if verification.verified {
                t.verified_recoveries += 1;
                if let Some(detected) = detected {
                    let secs = (verification.verified_at - detected).num_milliseconds() as f64 / 1000.0;
                    t.mttr_samples.push_back(secs.max(0.0));
                    if t.mttr_samples.len() > MTTR_SAMPLES {
                        t.mttr_samples.pop_front();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::DependencyHealth;
    use crate::diagnosis::incident::{IncidentId, IncidentType, Severity};
    use chrono::Duration;

    fn incident(seq: u64, detected_at: DateTime<Utc>) -> Incident {
        Incident {
            id: IncidentId::new(seq, detected_at),
            incident_type: IncidentType::ProcessCrash,
            severity: Severity::Critical,
            subject: Some("svc-A".to_string()),
            description: "down".to_string(),
            evidence: BTreeMap::new(),
            suggested_actions: Vec::new(),
            requires_human: false,
            detected_at,
        }
    }

    fn verification(incident: &Incident, verified: bool, at: DateTime<Utc>) -> VerificationResult {
        VerificationResult {
            incident_id: incident.id,
            verified,
            checks_passed: u32::from(verified),
            checks_failed: u32::from(!verified),
            message: String::new(),
            details: BTreeMap::new(),
            verified_at: at,
        }
    }

    #[test]
    fn test_empty_summary_defaults() {
        let summary = MetricsSink::new().summary();
        assert_eq!(summary.uptime_percent, 100.0);
        assert_eq!(summary.recovery_success_rate, 100.0);
        assert_eq!(summary.false_positive_rate, 0.0);
        assert_eq!(summary.mttr_seconds, 0.0);
    }

    #[test]
    fn test_uptime_counts_clean_snapshots() {
        let sink = MetricsSink::new();
        let healthy = SystemStatus::new(
            BTreeMap::new(),
            DependencyHealth::healthy("http://rpc", 1, 10.0),
        );
        let unhealthy = SystemStatus::new(
            BTreeMap::new(),
            DependencyHealth::unhealthy("http://rpc", 10.0, "refused"),
        );
        sink.record_status(&healthy);
        sink.record_status(&healthy);
        sink.record_status(&healthy);
        sink.record_status(&unhealthy);
        assert_eq!(sink.summary().uptime_percent, 75.0);
    }

    #[test]
    fn test_mttr_from_detection_to_verification() {
        let sink = MetricsSink::new();
        let start = Utc::now();
        let a = incident(1, start);
        sink.record_incident(&a);
        sink.record_verification(&verification(&a, true, start + Duration::seconds(70)));

        let b = incident(2, start);
        sink.record_incident(&b);
        sink.record_verification(&verification(&b, false, start + Duration::seconds(5)));

        let summary = sink.summary();
        assert_eq!(summary.mttr_seconds, 70.0);
        assert_eq!(summary.total_incidents, 2);
    }

    #[test]
    fn test_false_positive_only_for_known_ids() {
        let sink = MetricsSink::new();
        let a = incident(1, Utc::now());
        sink.record_incident(&a);
        sink.record_incident(&incident(2, Utc::now()));

        assert!(!sink.mark_false_positive("INC-unknown"));
        assert!(sink.mark_false_positive(&a.id.to_string()));
        assert!(!sink.mark_false_positive(&a.id.to_string()));
        assert_eq!(sink.summary().false_positive_rate, 50.0);
    }
}
