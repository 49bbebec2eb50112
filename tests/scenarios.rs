//! End-to-end monitoring cycles over fake probes.

use std::time::Duration;

use agent_medic::blockchain::DependencyHealth;
use agent_medic::config::MonitorConfig;
use agent_medic::diagnosis::{IncidentType, Severity};
use agent_medic::health::AgentState;
use agent_medic::recovery::{RecoveryAction, RecoveryStatus, RestartMethod};

mod common;
use common::{monitor_config, FakeDependency, Harness};

#[tokio::test(start_paused = true)]
async fn test_crashed_process_is_restarted_and_verified() {
    let h = Harness::new(monitor_config(), FakeDependency::healthy());
    h.processes.set("svc-a", false);

    let report = h.cycle.run_cycle("test").await.unwrap();
    assert_eq!(report.verifications.len(), 1);
    assert!(report.verifications[0].verified);
    assert_eq!(report.verifications[0].checks_failed, 0);

    let (status, incidents, recoveries) = report.into_parts();
    assert_eq!(status.active_incidents, 1);

    assert_eq!(incidents.len(), 1);
    let incident = &incidents[0];
    assert_eq!(incident.incident_type, IncidentType::ProcessCrash);
    assert_eq!(incident.severity, Severity::Critical);
    assert_eq!(incident.subject.as_deref(), Some("svc-A"));
    assert!(!incident.requires_human);

    let recovery = &recoveries[0];
    assert_eq!(recovery.action, RecoveryAction::RestartProcess);
    assert_eq!(recovery.status, RecoveryStatus::Success);
    assert_eq!(recovery.method.as_deref(), Some("systemctl"));
    assert!(recovery.duration >= Duration::from_secs(60));

    let restarts = h.control.restarts.lock().unwrap().clone();
    assert_eq!(restarts, vec![(RestartMethod::ServiceManager, "svc-a".to_string())]);
    assert_eq!(h.lifecycle.state("svc-A"), AgentState::Healthy);
    assert_eq!(h.sink.summary().recovery_success_rate, 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_first_restart_plan_waits_base_backoff() {
    let h = Harness::new(monitor_config(), FakeDependency::healthy());
    h.processes.set("svc-a", false);

    let (_, incidents) = {
        use agent_medic::escalation::CycleRunner;
        h.cycle.sweep().await
    };
    let plan = h.recoverer.plan(&incidents[0]);
    assert_eq!(plan.action, RecoveryAction::RestartProcess);
    assert_eq!(plan.parameters.backoff_seconds, Some(60));
    assert_eq!(plan.parameters.attempt, Some(0));
    assert!(!plan.parameters.force);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_dependency_gets_cooldown() {
    let dependency = FakeDependency::scripted(vec![
        DependencyHealth::unhealthy("http://rpc-1", 40.0, "HTTP error 429 Too Many Requests"),
        DependencyHealth::healthy("http://rpc-1", 120, 25.0),
    ]);
    let config = MonitorConfig::default();
    let h = Harness::new(config, dependency);

    let report = h.cycle.run_cycle("test").await.unwrap();

    assert_eq!(report.incidents.len(), 1);
    let incident = &report.incidents[0];
    assert_eq!(incident.incident_type, IncidentType::DependencyRateLimited);
    assert_eq!(incident.severity, Severity::Critical);
    assert!(incident.subject.is_none());

    let recovery = &report.recoveries[0];
    assert_eq!(recovery.action, RecoveryAction::ApplyCooldown);
    assert_eq!(recovery.status, RecoveryStatus::Success);
    assert!(recovery.duration >= Duration::from_secs(60));

    let verification = &report.verifications[0];
    assert!(verification.verified);
    assert_eq!(verification.message, "Cooldown effective - dependency accessible");
    assert_eq!(h.dependency.switches.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_restart_cap_hands_over_to_human() {
    let h = Harness::new(monitor_config(), FakeDependency::healthy());

    for attempt in 0..3 {
        h.processes.set("svc-a", false);
        let report = h.cycle.run_cycle("test").await.unwrap();
        assert_eq!(
            report.recoveries[0].action,
            RecoveryAction::RestartProcess,
            "attempt {}",
            attempt
        );
    }
    assert_eq!(h.recoverer.restart_count("svc-A"), 3);

    h.processes.set("svc-a", false);
    let report = h.cycle.run_cycle("test").await.unwrap();
    assert_eq!(report.incidents[0].incident_type, IncidentType::ProcessCrash);
    assert_eq!(report.recoveries[0].action, RecoveryAction::AlertHuman);
    assert_eq!(report.recoveries[0].status, RecoveryStatus::Skipped);
    assert!(!report.verifications[0].verified);
    assert_eq!(h.control.restarts.lock().unwrap().len(), 3);

    let alerts = h.notifier.alerts.lock().unwrap().clone();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].subject.as_deref(), Some("svc-A"));
    assert_eq!(alerts[0].kind, "process_crash");
}

#[tokio::test(start_paused = true)]
async fn test_restart_cap_rolls_forward() {
    let mut config = monitor_config();
    config.agents[0].max_restarts = 1;
    config.recovery.restart_window_mins = 5;
    let h = Harness::new(config, FakeDependency::healthy());

    h.processes.set("svc-a", false);
    h.cycle.run_cycle("test").await.unwrap();
    assert_eq!(h.recoverer.restart_count("svc-A"), 1);

    tokio::time::advance(Duration::from_secs(5 * 60)).await;
    assert_eq!(h.recoverer.restart_count("svc-A"), 0);

    h.processes.set("svc-a", false);
    let report = h.cycle.run_cycle("test").await.unwrap();
    assert_eq!(report.recoveries[0].action, RecoveryAction::RestartProcess);
}

#[tokio::test(start_paused = true)]
async fn test_agent_restarted_outside_the_medic_returns_to_healthy() {
    let mut config = monitor_config();
    config.agents[0].max_restarts = 0;
    let h = Harness::new(config, FakeDependency::healthy());

    h.processes.set("svc-a", false);
    let report = h.cycle.run_cycle("test").await.unwrap();
    assert_eq!(report.recoveries[0].action, RecoveryAction::AlertHuman);
    assert_eq!(h.lifecycle.state("svc-A"), AgentState::Failed);

    // An operator brings it back by hand.
    h.processes.set("svc-a", true);
    let report = h.cycle.run_cycle("test").await.unwrap();
    assert!(report.incidents.is_empty());
    assert_eq!(h.lifecycle.state("svc-A"), AgentState::Healthy);
    assert!(h.control.restarts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_healthy_system_yields_no_incidents() {
    let h = Harness::new(monitor_config(), FakeDependency::healthy());
    h.processes.set("svc-a", true);

    let report = h.cycle.run_cycle("test").await.unwrap();
    assert!(report.status.is_all_healthy());
    assert!(report.incidents.is_empty());
    assert!(report.recoveries.is_empty());
    assert!(h.control.restarts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_back_to_back_snapshots_match() {
    let h = Harness::new(monitor_config(), FakeDependency::healthy());
    h.processes.set("svc-a", true);

    let first = h.cycle.status_only().await;
    let second = h.cycle.status_only().await;
    assert_eq!(first.status_fields(), second.status_fields());

    // Status queries never act.
    assert!(h.control.restarts.lock().unwrap().is_empty());
    assert_eq!(h.sink.summary().total_checks, 0);
}
