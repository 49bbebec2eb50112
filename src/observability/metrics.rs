//! Metrics collection and exposition.
//!
//! # Metrics
//! - `medic_checks_total` (counter): subject checks by subject, status
//! - `medic_dependency_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `medic_dependency_latency_ms` (histogram): dependency probe latency
//! - `medic_incidents_total` (counter): incidents by type, severity
//! - `medic_recoveries_total` (counter): recoveries by action, status
//! - `medic_recovery_seconds` (histogram): recovery execution time
//! - `medic_verifications_total` (counter): verifications by outcome
//! - `medic_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `medic_tier_calls_total` (counter): escalation tier calls by tier, outcome
//! - `medic_quarantine_events_total` (counter): quarantine transitions
//! - `medic_notifications_total` (counter): human alerts by channel, outcome
//! - `medic_check_interval_seconds` (gauge): current full-cycle interval
//!
//! Recording functions are no-ops until a recorder is installed.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::diagnosis::incident::Incident;
use crate::health::types::AgentStatus;
use crate::recovery::plan::RecoveryResult;
use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

pub fn record_check(subject: &str, status: AgentStatus) {
    let status = match status {
        AgentStatus::Healthy => "healthy",
        AgentStatus::Degraded => "degraded",
        AgentStatus::Failed => "failed",
        AgentStatus::Unknown => "unknown",
    };
    counter!("medic_checks_total", "subject" => subject.to_string(), "status" => status)
        .increment(1);
}

pub fn record_dependency_health(dependency: &str, healthy: bool, latency_ms: f64) {
    gauge!("medic_dependency_healthy", "dependency" => dependency.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
    histogram!("medic_dependency_latency_ms", "dependency" => dependency.to_string())
        .record(latency_ms);
}

pub fn record_incident(incident: &Incident) {
    counter!(
        "medic_incidents_total",
        "type" => incident.incident_type.as_str(),
        "severity" => incident.severity.as_str()
    )
    .increment(1);
}

pub fn record_recovery(result: &RecoveryResult) {
    counter!(
        "medic_recoveries_total",
        "action" => result.action.as_str(),
        "status" => result.status.as_str()
    )
    .increment(1);
    histogram!("medic_recovery_seconds", "action" => result.action.as_str())
        .record(result.duration.as_secs_f64());
}

pub fn record_verification(verified: bool) {
    counter!("medic_verifications_total", "verified" => if verified { "true" } else { "false" })
        .increment(1);
}

pub fn record_circuit_state(dependency: &str, state: CircuitState) {
    gauge!("medic_circuit_state", "dependency" => dependency.to_string()).set(state.as_gauge());
}

pub fn record_tier_call(tier: &'static str, outcome: &'static str) {
    counter!("medic_tier_calls_total", "tier" => tier, "outcome" => outcome).increment(1);
}

pub fn record_quarantine_event(data_type: &'static str, event: &'static str) {
    counter!("medic_quarantine_events_total", "data_type" => data_type, "event" => event)
        .increment(1);
}

pub fn record_notification(channel: &'static str, outcome: &'static str) {
    counter!("medic_notifications_total", "channel" => channel, "outcome" => outcome).increment(1);
}

pub fn record_check_interval(interval: Duration) {
    gauge!("medic_check_interval_seconds").set(interval.as_secs_f64());
}
