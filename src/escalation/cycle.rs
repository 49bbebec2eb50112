//! Full Observer → Diagnoser → Recoverer → Verifier cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::SharedConfig;
use crate::diagnosis::{Diagnoser, Incident};
use crate::health::lifecycle::LifecycleTracker;
use crate::health::observer::Observer;
use crate::health::types::SystemStatus;
use crate::notify::{AlertRouter, HumanAlert};
use crate::observability::sink::EventSink;
use crate::observability::tracing::{cycle_span, new_cycle_id};
use crate::recovery::plan::{RecoveryAction, RecoveryResult};
use crate::recovery::Recoverer;
use crate::verification::{VerificationResult, Verifier};

/// Failure of a full cycle, caught at the scheduler boundary.
#[derive(Debug, Clone, Error)]
pub enum CycleError {
    #[error("A cycle is already in progress")]
    InFlight,

    #[error("Cycle panicked: {0}")]
    Panicked(String),

    #[error("Cycle aborted: {0}")]
    Aborted(String),
}

/// Everything one full cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub trigger: String,
    pub status: SystemStatus,
    pub incidents: Vec<Incident>,
    pub recoveries: Vec<RecoveryResult>,
    pub verifications: Vec<VerificationResult>,
    pub completed_at: DateTime<Utc>,
}

impl CycleReport {
    pub fn into_parts(self) -> (SystemStatus, Vec<Incident>, Vec<RecoveryResult>) {
        (self.status, self.incidents, self.recoveries)
    }
}

/// The two things the scheduler asks of the monitoring pipeline.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    /// Observe and diagnose only. No recovery, no lifecycle or sink updates.
    async fn sweep(&self) -> (SystemStatus, Vec<Incident>);

    /// One full cycle. At most one runs at a time.
    async fn full_cycle(&self, trigger: &str) -> Result<CycleReport, CycleError>;

    fn is_in_flight(&self) -> bool {
        false
    }
}

/// Clears the in-flight flag when dropped, including during a panic.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct MonitorCycle {
    config: SharedConfig,
    observer: Arc<Observer>,
    diagnoser: Diagnoser,
    recoverer: Arc<Recoverer>,
    verifier: Arc<Verifier>,
    lifecycle: Arc<LifecycleTracker>,
    sink: Arc<dyn EventSink>,
    alerts: Arc<AlertRouter>,
    in_flight: AtomicBool,
}

impl MonitorCycle {
    pub fn new(
        config: SharedConfig,
        observer: Arc<Observer>,
        recoverer: Arc<Recoverer>,
        verifier: Arc<Verifier>,
        lifecycle: Arc<LifecycleTracker>,
        sink: Arc<dyn EventSink>,
        alerts: Arc<AlertRouter>,
    ) -> Self {
        Self {
            config,
            observer,
            diagnoser: Diagnoser::new(),
            recoverer,
            verifier,
            lifecycle,
            sink,
            alerts,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Snapshot only. Zero side effects beyond the probe calls.
    pub async fn status_only(&self) -> SystemStatus {
        self.observer.observe().await
    }

    /// Run one full cycle.
    pub async fn run_cycle(&self, trigger: &str) -> Result<CycleReport, CycleError> {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            tracing::debug!(trigger = %trigger, "Cycle suppressed, another is in flight");
            return Err(CycleError::InFlight);
        };

        let cycle_id = new_cycle_id();
        let report = self
            .cycle_body(cycle_id, trigger)
            .instrument(cycle_span(cycle_id, trigger))
            .await;
        Ok(report)
    }

    async fn cycle_body(&self, cycle_id: Uuid, trigger: &str) -> CycleReport {
        tracing::info!("Cycle started");
        let config = self.config.load_full();

        let status = self.observer.observe().await;
        self.lifecycle.observe(&status);
        self.sink.record_status(&status);

        let incidents = self.diagnoser.analyze(&status, &config.probes);
        for incident in &incidents {
            self.sink.record_incident(incident);
        }

        let mut recoveries = Vec::with_capacity(incidents.len());
        let mut verifications = Vec::with_capacity(incidents.len());
        for incident in &incidents {
            let plan = self.recoverer.plan(incident);
            tracing::info!(
                incident_id = %incident.id,
                action = plan.action.as_str(),
                subject = %incident.subject_label(),
                reason = %plan.reason,
                "Recovery planned"
            );

            if plan.action == RecoveryAction::AlertHuman {
                self.alerts.send(&HumanAlert::human_required(incident, &plan.reason));
            }

            let result = self.recoverer.execute(&plan).await;
            self.sink.record_recovery(&result);

            let verification = self.verifier.confirm(&plan, &result).await;
            self.sink.record_verification(&verification);

            recoveries.push(result);
            verifications.push(verification);
        }

        tracing::info!(
            incidents = incidents.len(),
            recoveries = recoveries.len(),
            verified = verifications.iter().filter(|v| v.verified).count(),
            "Cycle complete"
        );

        CycleReport {
            cycle_id,
            trigger: trigger.to_string(),
            status,
            incidents,
            recoveries,
            verifications,
            completed_at: Utc::now(),
        }
    }
}

#[async_trait]
impl CycleRunner for MonitorCycle {
    async fn sweep(&self) -> (SystemStatus, Vec<Incident>) {
        let status = self.status_only().await;
        let incidents = self.diagnoser.analyze(&status, &self.config.load().probes);
        (status, incidents)
    }

    async fn full_cycle(&self, trigger: &str) -> Result<CycleReport, CycleError> {
        self.run_cycle(trigger).await
    }

    fn is_in_flight(&self) -> bool {
        MonitorCycle::is_in_flight(self)
    }
}
