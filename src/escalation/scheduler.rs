//! Escalation scheduler: the single control loop.
//!
//! # Tick
//! ```text
//! (sweep due?) → status-only sweep → incidents become Tier0 reasons
//! Tier0 checks → clean: done
//!              → alert: Tier1 window open? → advisory verdict
//!                       → escalate: Tier2 window open, nothing in flight? → full cycle
//! ```
//!
//! # Design Decisions
//! - Calls inside a Tier1/Tier2 window are skipped for that tick, never queued
//! - Verified signals are acknowledged only after Tier1 has consulted on them
//! - The full cycle runs in its own task so a panic surfaces as a `CycleError`
//! - After a failed cycle the loop pauses, then resumes; it never exits on its own
//! - The latest state is published through an `ArcSwap` for status readers

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::config::SharedConfig;
use crate::diagnosis::Severity;
use crate::escalation::advisory::{
    consult, Advisory, AdvisoryAction, AdvisoryRequest, AdvisorySeverity, AdvisoryVerdict,
};
use crate::escalation::cycle::{CycleError, CycleReport, CycleRunner};
use crate::escalation::interval::{IntervalState, IntervalTracker};
use crate::escalation::tier0::{Tier0Monitor, Tier0Report};
use crate::health::lifecycle::{AgentState, LifecycleTracker};
use crate::health::types::SystemStatus;
use crate::notify::{AlertRouter, HumanAlert};
use crate::observability::metrics;
use crate::resilience::WindowLimiter;

/// What one tick did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Clean,
    /// Tier0 alerted but the Tier1 window was closed.
    Tier1Skipped,
    /// Tier1 answered without asking for escalation.
    Advised(AdvisoryVerdict),
    /// Escalation requested but the Tier2 window was closed.
    Tier2Skipped,
    /// Escalation requested while a cycle was already running.
    CycleInFlight,
    CycleCompleted { cycle_id: Uuid, incidents: usize, recoveries: usize },
    CycleFailed(CycleError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub trigger: String,
    pub incidents: usize,
    pub recoveries: usize,
    pub verified: usize,
    pub completed_at: DateTime<Utc>,
}

impl From<&CycleReport> for CycleSummary {
    fn from(report: &CycleReport) -> Self {
        Self {
            cycle_id: report.cycle_id,
            trigger: report.trigger.clone(),
            incidents: report.incidents.len(),
            recoveries: report.recoveries.len(),
            verified: report.verifications.iter().filter(|v| v.verified).count(),
            completed_at: report.completed_at,
        }
    }
}

/// Latest scheduler state, published after every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub updated_at: DateTime<Utc>,
    pub ticks: u64,
    pub interval_state: IntervalState,
    pub interval_secs: u64,
    pub consecutive_failures: u32,
    pub last_status: Option<SystemStatus>,
    pub last_tier0: Option<Tier0Report>,
    pub last_verdict: Option<AdvisoryVerdict>,
    pub last_cycle: Option<CycleSummary>,
    pub cycles_run: u64,
    pub cycle_errors: u64,
    pub last_error: Option<String>,
    pub agent_states: BTreeMap<String, AgentState>,
}

impl Default for SchedulerSnapshot {
    fn default() -> Self {
        Self {
            updated_at: Utc::now(),
            ticks: 0,
            interval_state: IntervalState::Default,
            interval_secs: 0,
            consecutive_failures: 0,
            last_status: None,
            last_tier0: None,
            last_verdict: None,
            last_cycle: None,
            cycles_run: 0,
            cycle_errors: 0,
            last_error: None,
            agent_states: BTreeMap::new(),
        }
    }
}

pub type SnapshotHandle = Arc<ArcSwap<SchedulerSnapshot>>;

pub struct EscalationScheduler {
    config: SharedConfig,
    tier0: Tier0Monitor,
    advisory: Arc<dyn Advisory>,
    cycle: Arc<dyn CycleRunner>,
    lifecycle: Arc<LifecycleTracker>,
    alerts: Option<Arc<AlertRouter>>,
    tier1: WindowLimiter,
    tier2: WindowLimiter,
    interval: IntervalTracker,
    next_sweep: Option<Instant>,
    state: SchedulerSnapshot,
    published: SnapshotHandle,
}

impl EscalationScheduler {
    pub fn new(
        config: SharedConfig,
        tier0: Tier0Monitor,
        advisory: Arc<dyn Advisory>,
        cycle: Arc<dyn CycleRunner>,
        lifecycle: Arc<LifecycleTracker>,
    ) -> Self {
        let scheduler = config.load_full().scheduler.clone();
        Self {
            config,
            tier0,
            advisory,
            cycle,
            lifecycle,
            alerts: None,
            tier1: WindowLimiter::new(Duration::from_secs(scheduler.tier1_window_secs)),
            tier2: WindowLimiter::new(Duration::from_secs(scheduler.tier2_window_secs)),
            interval: IntervalTracker::new(),
            next_sweep: None,
            state: SchedulerSnapshot::default(),
            published: Arc::new(ArcSwap::from_pointee(SchedulerSnapshot::default())),
        }
    }

    /// Route Tier1 `alert_human` verdicts to humans.
    pub fn with_alerts(mut self, alerts: Arc<AlertRouter>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Handle for status readers; stays valid after `run` consumes the scheduler.
    pub fn snapshot_handle(&self) -> SnapshotHandle {
        Arc::clone(&self.published)
    }

    /// One Tier0 tick, escalating as far as the verdicts and windows allow.
    pub async fn tick(&mut self) -> TickOutcome {
        let config = self.config.load_full();
        let scheduler = &config.scheduler;
        self.tier1.set_window(Duration::from_secs(scheduler.tier1_window_secs));
        self.tier2.set_window(Duration::from_secs(scheduler.tier2_window_secs));
        self.state.ticks += 1;

        let mut reasons = Vec::new();
        if self.sweep_due() {
            let (status, incidents) = self.cycle.sweep().await;
            self.interval.update(incidents.len(), scheduler);
            self.schedule_next_sweep();
            for incident in &incidents {
                reasons.push(format!(
                    "{} on {}: {}",
                    incident.incident_type.as_str(),
                    incident.subject_label(),
                    incident.description
                ));
            }
            self.state.last_status = Some(status);
        }

        let report = self.tier0.check(reasons).await;
        self.state.consecutive_failures = report.consecutive_failures;
        let alert = report.is_alert();
        metrics::record_tier_call("tier0", if alert { "alert" } else { "clean" });
        let request = AdvisoryRequest::from(&report);
        let signal_ids = report.signal_ids.clone();
        self.state.last_tier0 = Some(report);

        let outcome = if !alert {
            TickOutcome::Clean
        } else {
            self.escalate(request, &signal_ids).await
        };

        self.publish();
        outcome
    }

    async fn escalate(&mut self, request: AdvisoryRequest, signal_ids: &[String]) -> TickOutcome {
        if !self.tier1.try_acquire() {
            metrics::record_tier_call("tier1", "skipped");
            tracing::debug!(
                remaining_secs = self.tier1.remaining().as_secs(),
                "Tier1 window closed, skipping advisory"
            );
            return TickOutcome::Tier1Skipped;
        }

        let verdict = consult(self.advisory.as_ref(), &request).await;
        self.tier0.acknowledge_signals(signal_ids);
        self.state.last_verdict = Some(verdict.clone());

        if verdict.action == AdvisoryAction::AlertHuman {
            if let Some(alerts) = &self.alerts {
                let severity = match verdict.severity {
                    AdvisorySeverity::Critical => Severity::Critical,
                    _ => Severity::Warning,
                };
                alerts.send(&HumanAlert::new(
                    None,
                    "advisory",
                    severity,
                    verdict.summary.clone(),
                    format!("{}\n\nTier0: {}", verdict.reason, request.reasons.join("; ")),
                ));
            }
        }

        if !verdict.wants_cycle() {
            return TickOutcome::Advised(verdict);
        }

        if self.cycle.is_in_flight() {
            metrics::record_tier_call("tier2", "in_flight");
            return TickOutcome::CycleInFlight;
        }
        if !self.tier2.try_acquire() {
            metrics::record_tier_call("tier2", "skipped");
            tracing::debug!(
                remaining_secs = self.tier2.remaining().as_secs(),
                "Tier2 window closed, skipping full cycle"
            );
            return TickOutcome::Tier2Skipped;
        }

        metrics::record_tier_call("tier2", "started");
        match self.run_guarded_cycle(verdict.summary.clone()).await {
            Ok(report) => {
                let config = self.config.load_full();
                self.interval.update(report.incidents.len(), &config.scheduler);
                self.schedule_next_sweep();
                self.state.cycles_run += 1;
                let summary = CycleSummary::from(&report);
                let outcome = TickOutcome::CycleCompleted {
                    cycle_id: summary.cycle_id,
                    incidents: summary.incidents,
                    recoveries: summary.recoveries,
                };
                self.state.last_status = Some(report.status);
                self.state.last_cycle = Some(summary);
                outcome
            }
            Err(CycleError::InFlight) => TickOutcome::CycleInFlight,
            Err(e) => {
                metrics::record_tier_call("tier2", "failed");
                tracing::error!(error = %e, "Full cycle failed");
                self.state.cycle_errors += 1;
                self.state.last_error = Some(e.to_string());
                TickOutcome::CycleFailed(e)
            }
        }
    }

    /// Run the cycle in its own task so a panic cannot take the loop down.
    async fn run_guarded_cycle(&self, trigger: String) -> Result<CycleReport, CycleError> {
        let cycle = Arc::clone(&self.cycle);
        match tokio::spawn(async move { cycle.full_cycle(&trigger).await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(CycleError::Panicked(panic_message(e.into_panic()))),
            Err(e) => Err(CycleError::Aborted(e.to_string())),
        }
    }

    fn sweep_due(&self) -> bool {
        self.next_sweep.map_or(true, |at| Instant::now() >= at)
    }

    fn schedule_next_sweep(&mut self) {
        let interval = self.interval.interval(&self.config.load().scheduler);
        metrics::record_check_interval(interval);
        self.next_sweep = Some(Instant::now() + interval);
    }

    fn publish(&mut self) {
        let config = self.config.load_full();
        self.state.updated_at = Utc::now();
        self.state.interval_state = self.interval.state();
        self.state.interval_secs = self.interval.interval(&config.scheduler).as_secs();
        self.state.agent_states = self.lifecycle.states();
        self.published.store(Arc::new(self.state.clone()));
    }

    /// Tick until `shutdown` fires (or its sender is dropped).
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut tick_secs = self.config.load().scheduler.tier0_tick_secs.max(1);
        let mut ticker = tokio::time::interval(Duration::from_secs(tick_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(tick_secs, "Escalation scheduler started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {}
            }

            if let TickOutcome::CycleFailed(_) = self.tick().await {
                let pause = Duration::from_secs(self.config.load().scheduler.error_pause_secs);
                tracing::warn!(pause_secs = pause.as_secs(), "Pausing after cycle failure");
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }

            let configured = self.config.load().scheduler.tier0_tick_secs.max(1);
            if configured != tick_secs {
                tracing::info!(from = tick_secs, to = configured, "Tier0 tick changed");
                tick_secs = configured;
                let period = Duration::from_secs(tick_secs);
                ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            }
        }

        tracing::info!("Escalation scheduler stopped");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
