//! Verifier: confirms a recovery actually fixed the problem.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::SharedConfig;
use crate::diagnosis::incident::IncidentId;
use crate::health::lifecycle::{AgentState, LifecycleTracker};
use crate::health::observer::Observer;
use crate::health::types::Observation;
use crate::recovery::plan::{RecoveryAction, RecoveryPlan, RecoveryResult, RecoveryStatus};
use crate::resilience::BreakerRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub incident_id: IncidentId,
    pub verified: bool,
    pub checks_passed: u32,
    pub checks_failed: u32,
    pub message: String,
    pub details: BTreeMap<String, serde_json::Value>,
    pub verified_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tally {
    passed: u32,
    failed: u32,
    details: BTreeMap<String, serde_json::Value>,
}

impl Tally {
    fn check(&mut self, name: &str, ok: bool, detail: serde_json::Value) {
        if ok {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.details.insert(name.to_string(), detail);
    }

    fn verified(&self) -> bool {
        self.passed > 0 && self.failed == 0
    }
}

pub struct Verifier {
    config: SharedConfig,
    observer: Arc<Observer>,
    breakers: Arc<BreakerRegistry>,
    lifecycle: Arc<LifecycleTracker>,
    dependency_breaker: String,
}

impl Verifier {
    pub fn new(
        config: SharedConfig,
        observer: Arc<Observer>,
        breakers: Arc<BreakerRegistry>,
        lifecycle: Arc<LifecycleTracker>,
    ) -> Self {
        let dependency_breaker = config.load().dependency.name.clone();
        Self {
            config,
            observer,
            breakers,
            lifecycle,
            dependency_breaker,
        }
    }

    /// Re-check the state relevant to `plan` after the settle delay.
    pub async fn confirm(&self, plan: &RecoveryPlan, result: &RecoveryResult) -> VerificationResult {
        if matches!(result.status, RecoveryStatus::Skipped | RecoveryStatus::Failed) {
            return VerificationResult {
                incident_id: plan.incident_id,
                verified: false,
                checks_passed: 0,
                checks_failed: 0,
                message: "Verification skipped - recovery did not execute".to_string(),
                details: BTreeMap::from([("reason".to_string(), json!(result.status.as_str()))]),
                verified_at: Utc::now(),
            };
        }

        let settle = Duration::from_secs(self.config.load().verification.settle_delay_secs);
        tokio::time::sleep(settle).await;

        let (tally, message) = match plan.action {
            RecoveryAction::RestartProcess => self.verify_restart(plan).await,
            RecoveryAction::SwitchDependencyEndpoint | RecoveryAction::ApplyCooldown => {
                self.verify_dependency(plan).await
            }
            RecoveryAction::AlertHuman | RecoveryAction::NoAction => {
                let mut tally = Tally::default();
                let ok = result.status == RecoveryStatus::Success;
                tally.check("recovery_status", ok, json!(result.status.as_str()));
                (tally, "Verification based on recovery status".to_string())
            }
        };

        let verified = tally.verified();
        tracing::info!(
            incident_id = %plan.incident_id,
            verified,
            passed = tally.passed,
            failed = tally.failed,
            "{}",
            message
        );

        VerificationResult {
            incident_id: plan.incident_id,
            verified,
            checks_passed: tally.passed,
            checks_failed: tally.failed,
            message,
            details: tally.details,
            verified_at: Utc::now(),
        }
    }

    async fn verify_restart(&self, plan: &RecoveryPlan) -> (Tally, String) {
        let config = self.config.load_full();
        let mut tally = Tally::default();
        let Some(agent) = plan.subject.as_deref().and_then(|s| config.agent(s)) else {
            return (tally, "Process restart verification failed: unknown subject".to_string());
        };
        let limit = config.probes.timeout();

        match self.observer.check_process(agent, limit).await {
            Some(Observation::Confirmed(check)) => {
                tally.check("process_check", check.running, json!(check));
            }
            Some(Observation::Indeterminate(e)) => {
                tally.check("process_check", false, json!({ "indeterminate": e.to_string() }));
            }
            None => {}
        }

        if let Some(endpoint) = self.observer.check_endpoint(agent, limit).await {
            tally.check("health_endpoint", endpoint.healthy, json!(endpoint));
        }

        let verified = tally.verified();
        self.lifecycle.transition(
            &agent.name,
            if verified { AgentState::Healthy } else { AgentState::Failed },
        );

        let message = if verified {
            "Process restart verified"
        } else {
            "Process restart verification failed"
        };
        (tally, message.to_string())
    }

    async fn verify_dependency(&self, plan: &RecoveryPlan) -> (Tally, String) {
        let config = self.config.load_full();
        let health = self.observer.check_dependency(config.probes.timeout()).await;

        if health.healthy {
            self.breakers.record_success(&self.dependency_breaker);
        } else {
            self.breakers.record_failure(&self.dependency_breaker);
        }

        let mut tally = Tally::default();
        tally.check("dependency", health.healthy, json!(health));

        let message = match (plan.action, health.healthy) {
            (RecoveryAction::ApplyCooldown, true) => "Cooldown effective - dependency accessible".to_string(),
            (RecoveryAction::ApplyCooldown, false) => "Dependency still rate limited after cooldown".to_string(),
            (_, true) => format!("Endpoint switch verified ({})", health.endpoint),
            (_, false) => format!(
                "Dependency still unhealthy: {}",
                health.error.as_deref().unwrap_or("unknown error")
            ),
        };
        (tally, message)
    }
}
