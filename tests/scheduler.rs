//! Escalation scheduler behavior under paused time.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use agent_medic::config::{shared, SharedConfig};
use agent_medic::escalation::{
    AdvisoryAction, AdvisorySeverity, AdvisoryVerdict, CycleError, EscalationScheduler,
    TickOutcome, Tier0Monitor,
};
use agent_medic::health::LifecycleTracker;
use agent_medic::lifecycle::Shutdown;
use agent_medic::notify::AlertRouter;
use agent_medic::quarantine::{DataType, QuarantineGate};
use serde_json::json;

mod common;
use common::{
    monitor_config, CountingAdvisory, FakeDependency, FakeHost, RecordingNotifier, ScriptedCycle,
};

fn scheduler(
    config: &SharedConfig,
    host: FakeHost,
    advisory: Arc<CountingAdvisory>,
    cycle: Arc<ScriptedCycle>,
) -> EscalationScheduler {
    let tier0 = Tier0Monitor::new(
        config.clone(),
        Arc::new(host),
        Arc::new(FakeDependency::healthy()),
        None,
    );
    EscalationScheduler::new(
        config.clone(),
        tier0,
        advisory,
        cycle,
        Arc::new(LifecycleTracker::new()),
    )
}

async fn step(secs: u64) {
    tokio::time::advance(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_alerts_inside_tier1_window_make_one_call() {
    let config = shared(monitor_config());
    let advisory = Arc::new(CountingAdvisory::escalating());
    let cycle = Arc::new(ScriptedCycle::default());
    let mut scheduler = scheduler(&config, FakeHost::overloaded(), advisory.clone(), cycle.clone());

    assert!(matches!(scheduler.tick().await, TickOutcome::CycleCompleted { .. }));
    step(30).await;
    assert!(matches!(scheduler.tick().await, TickOutcome::Tier1Skipped));
    step(30).await;
    assert!(matches!(scheduler.tick().await, TickOutcome::Tier1Skipped));
    assert_eq!(advisory.calls(), 1);

    // Window reopens for Tier1, but Tier2 still holds.
    step(60).await;
    assert!(matches!(scheduler.tick().await, TickOutcome::Tier2Skipped));
    assert_eq!(advisory.calls(), 2);
    assert_eq!(cycle.cycles(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_cycle_per_tier2_window() {
    let config = shared(monitor_config());
    let advisory = Arc::new(CountingAdvisory::escalating());
    let cycle = Arc::new(ScriptedCycle::default());
    let mut scheduler = scheduler(&config, FakeHost::overloaded(), advisory.clone(), cycle.clone());

    // Twenty ticks over 600s of constant alerts.
    for _ in 0..20 {
        scheduler.tick().await;
        step(30).await;
    }

    // Cycles at 0s and 360s (the first Tier1 slot past 300s).
    assert_eq!(cycle.cycles(), 2);
    assert_eq!(advisory.calls(), 5);

    let snapshot = scheduler.snapshot_handle().load_full();
    assert_eq!(snapshot.ticks, 20);
    assert_eq!(snapshot.cycles_run, 2);
    assert_eq!(snapshot.consecutive_failures, 20);
}

#[tokio::test(start_paused = true)]
async fn test_cycle_panic_is_contained() {
    let config = shared(monitor_config());
    let advisory = Arc::new(CountingAdvisory::escalating());
    let cycle = Arc::new(ScriptedCycle::panicking_on(vec![1]));
    let mut scheduler = scheduler(&config, FakeHost::overloaded(), advisory, cycle.clone());

    match scheduler.tick().await {
        TickOutcome::CycleFailed(CycleError::Panicked(message)) => {
            assert!(message.contains("scripted failure in cycle 1"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    let snapshot = scheduler.snapshot_handle().load_full();
    assert_eq!(snapshot.cycle_errors, 1);
    assert!(snapshot.last_error.as_deref().unwrap().contains("scripted failure"));

    step(300).await;
    assert!(matches!(scheduler.tick().await, TickOutcome::CycleCompleted { .. }));
    assert_eq!(cycle.cycles(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_survives_failure_and_stops_on_shutdown() {
    let config = shared(monitor_config());
    let advisory = Arc::new(CountingAdvisory::escalating());
    let cycle = Arc::new(ScriptedCycle::panicking_on(vec![1]));
    let scheduler = scheduler(&config, FakeHost::overloaded(), advisory, cycle.clone());
    let snapshot = scheduler.snapshot_handle();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(scheduler.run(shutdown.subscribe()));

    tokio::time::sleep(Duration::from_secs(700)).await;
    shutdown.trigger();
    handle.await.unwrap();

    let snapshot = snapshot.load_full();
    assert_eq!(snapshot.cycle_errors, 1);
    assert!(snapshot.cycles_run >= 1);
    assert!(cycle.cycles() >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_advisory_escalates() {
    let config = shared(monitor_config());
    let advisory = Arc::new(CountingAdvisory::unreachable());
    let cycle = Arc::new(ScriptedCycle::default());
    let mut scheduler = scheduler(&config, FakeHost::overloaded(), advisory, cycle.clone());

    assert!(matches!(scheduler.tick().await, TickOutcome::CycleCompleted { .. }));
    let verdict = scheduler.snapshot_handle().load_full().last_verdict.clone().unwrap();
    assert!(verdict.escalate);
    assert_eq!(verdict.action, AdvisoryAction::Escalate);
    assert_eq!(cycle.cycles(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clean_tick_skips_advisory() {
    let config = shared(monitor_config());
    let advisory = Arc::new(CountingAdvisory::escalating());
    let cycle = Arc::new(ScriptedCycle::default());
    let mut scheduler = scheduler(&config, FakeHost::calm(), advisory.clone(), cycle.clone());

    assert!(matches!(scheduler.tick().await, TickOutcome::Clean));
    assert_eq!(advisory.calls(), 0);
    assert_eq!(cycle.sweeps.load(Ordering::SeqCst), 1);
    assert_eq!(cycle.cycles(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_verdict_does_not_escalate_but_alert_human_notifies() {
    let config = shared(monitor_config());
    let advisory = Arc::new(CountingAdvisory::answering(AdvisoryVerdict {
        severity: AdvisorySeverity::Critical,
        summary: "memory pressure".to_string(),
        action: AdvisoryAction::AlertHuman,
        escalate: false,
        reason: "sustained".to_string(),
    }));
    let cycle = Arc::new(ScriptedCycle::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let alerts = Arc::new(AlertRouter::new(config.clone(), vec![notifier.clone()]));
    let mut scheduler =
        scheduler(&config, FakeHost::overloaded(), advisory, cycle.clone()).with_alerts(alerts);

    assert!(matches!(scheduler.tick().await, TickOutcome::Advised(_)));
    assert_eq!(cycle.cycles(), 0);

    let sent = notifier.alerts.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "memory pressure");
    assert_eq!(sent[0].subject_label(), "system");
}

#[tokio::test(start_paused = true)]
async fn test_verified_signal_waits_for_open_tier1_window() {
    let config = shared(monitor_config());
    let advisory = Arc::new(CountingAdvisory::answering(AdvisoryVerdict {
        severity: AdvisorySeverity::Warning,
        summary: "watching".to_string(),
        action: AdvisoryAction::Monitor,
        escalate: false,
        reason: String::new(),
    }));
    let cycle = Arc::new(ScriptedCycle::default());
    let gate = Arc::new(QuarantineGate::new(None));
    let tier0 = Tier0Monitor::new(
        config.clone(),
        Arc::new(FakeHost::overloaded()),
        Arc::new(FakeDependency::healthy()),
        Some(gate.clone()),
    );
    let mut scheduler = EscalationScheduler::new(
        config.clone(),
        tier0,
        advisory.clone(),
        cycle,
        Arc::new(LifecycleTracker::new()),
    );

    assert!(matches!(scheduler.tick().await, TickOutcome::Advised(_)));

    // Verified while the Tier1 window is closed.
    let threat = json!({ "address": "0xdead", "kind": "drainer" });
    gate.submit(DataType::Threat, threat.clone(), "feed-a");
    let item = gate.submit(DataType::Threat, threat, "feed-b");
    step(30).await;
    assert!(matches!(scheduler.tick().await, TickOutcome::Tier1Skipped));
    assert_eq!(gate.unacted_verified().len(), 1);

    step(120).await;
    assert!(matches!(scheduler.tick().await, TickOutcome::Advised(_)));
    assert_eq!(advisory.calls(), 2);
    let requests = advisory.requests.lock().unwrap().clone();
    assert!(requests[1].reasons.iter().any(|r| r.contains(&item.id)));
    assert!(gate.unacted_verified().is_empty());
}
