//! Recoverer: `Incident` → `RecoveryPlan` → `RecoveryResult`.
//!
//! # Responsibilities
//! - Map each incident type onto the closed action set
//! - Cap restarts per subject in a rolling window, downgrading to AlertHuman
//! - Execute restarts through an ordered list of mechanisms
//! - Gate dependency-targeted actions on the dependency's circuit breaker
//!
//! # Design Decisions
//! - AlertHuman and NoAction never have side effects; they return Skipped
//! - Every executed restart counts toward the cap, successful or not
//! - Exhausted methods are reported as Failed, never retried here

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::blockchain::types::{DependencyControl, DependencyError};
use crate::config::{AgentConfig, SharedConfig};
use crate::diagnosis::incident::{Incident, IncidentType};
use crate::health::lifecycle::LifecycleTracker;
use crate::recovery::attempts::RestartLedger;
use crate::recovery::control::{RestartMethod, RestartTarget, ServiceControl};
use crate::recovery::plan::{
    PlanParameters, RecoveryAction, RecoveryExecutionError, RecoveryPlan, RecoveryResult,
    RecoveryStatus,
};
use crate::resilience::backoff::restart_backoff;
use crate::resilience::BreakerRegistry;

pub struct Recoverer {
    config: SharedConfig,
    control: Arc<dyn ServiceControl>,
    dependency: Arc<dyn DependencyControl>,
    breakers: Arc<BreakerRegistry>,
    lifecycle: Arc<LifecycleTracker>,
    ledger: Mutex<RestartLedger>,
    /// Breaker key for the dependency, fixed when the recoverer is built.
    dependency_breaker: String,
}

impl Recoverer {
    pub fn new(
        config: SharedConfig,
        control: Arc<dyn ServiceControl>,
        dependency: Arc<dyn DependencyControl>,
        breakers: Arc<BreakerRegistry>,
        lifecycle: Arc<LifecycleTracker>,
    ) -> Self {
        let dependency_breaker = config.load().dependency.name.clone();
        Self {
            config,
            control,
            dependency,
            breakers,
            lifecycle,
            ledger: Mutex::new(RestartLedger::new()),
            dependency_breaker,
        }
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, RestartLedger> {
        match self.ledger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Restarts recorded for `subject` in the current window.
    pub fn restart_count(&self, subject: &str) -> u32 {
        let window = self.restart_window();
        self.ledger().count(subject, window)
    }

    fn restart_window(&self) -> Duration {
        Duration::from_secs(self.config.load().recovery.restart_window_mins * 60)
    }

    fn record_restart(&self, subject: &str) {
        self.ledger().record(subject);
    }

    /// Decide what to do about one incident.
    pub fn plan(&self, incident: &Incident) -> RecoveryPlan {
        let base = RecoveryPlan {
            incident_id: incident.id,
            action: RecoveryAction::NoAction,
            subject: incident.subject.clone(),
            parameters: PlanParameters::default(),
            requires_human: false,
            reason: String::new(),
        };

        if incident.requires_human {
            return RecoveryPlan {
                action: RecoveryAction::AlertHuman,
                requires_human: true,
                reason: incident.description.clone(),
                ..base
            };
        }

        let config = self.config.load();
        match incident.incident_type {
            IncidentType::ProcessCrash | IncidentType::ProcessHang => {
                let Some(agent) = incident.subject.as_deref().and_then(|s| config.agent(s)) else {
                    return RecoveryPlan {
                        reason: "No automated recovery available for unknown subject".to_string(),
                        ..base
                    };
                };

                let count = self.restart_count(&agent.name);
                if count >= agent.max_restarts {
                    return RecoveryPlan {
                        action: RecoveryAction::AlertHuman,
                        requires_human: true,
                        reason: format!(
                            "Max restarts ({}) exceeded in {} minutes",
                            agent.max_restarts, config.recovery.restart_window_mins
                        ),
                        ..base
                    };
                }

                let force = incident.incident_type == IncidentType::ProcessHang;
                let backoff = if force {
                    0
                } else {
                    restart_backoff(agent.restart_backoff_secs, count)
                };
                RecoveryPlan {
                    action: RecoveryAction::RestartProcess,
                    parameters: PlanParameters {
                        backoff_seconds: Some(backoff),
                        attempt: Some(count),
                        force,
                        ..PlanParameters::default()
                    },
                    reason: incident.description.clone(),
                    ..base
                }
            }
            IncidentType::DependencyRateLimited => RecoveryPlan {
                action: RecoveryAction::ApplyCooldown,
                parameters: PlanParameters {
                    cooldown_seconds: Some(config.recovery.cooldown_secs),
                    ..PlanParameters::default()
                },
                reason: incident.description.clone(),
                ..base
            },
            IncidentType::DependencyUnavailable => RecoveryPlan {
                action: RecoveryAction::SwitchDependencyEndpoint,
                reason: incident.description.clone(),
                ..base
            },
            IncidentType::OperationFailures => RecoveryPlan {
                action: RecoveryAction::AlertHuman,
                requires_human: true,
                reason: "Operation failures require investigation".to_string(),
                ..base
            },
            IncidentType::EndpointFailure | IncidentType::HighLatency => RecoveryPlan {
                reason: "No automated recovery available".to_string(),
                ..base
            },
        }
    }

    /// Carry out a plan.
    pub async fn execute(&self, plan: &RecoveryPlan) -> RecoveryResult {
        let start = Instant::now();

        if plan.requires_human || plan.action == RecoveryAction::AlertHuman {
            return RecoveryResult::new(
                plan,
                RecoveryStatus::Skipped,
                start.elapsed(),
                format!("Human intervention required: {}", plan.reason),
            );
        }

        if plan.action.targets_dependency() {
            let breaker = &self.dependency_breaker;
            if !self.breakers.can_execute(breaker) {
                let err = RecoveryExecutionError::BreakerOpen(breaker.clone());
                tracing::warn!(incident_id = %plan.incident_id, error = %err, "Skipping dependency action");
                return RecoveryResult::new(plan, RecoveryStatus::Skipped, start.elapsed(), err.to_string());
            }
        }

        let result = match plan.action {
            RecoveryAction::RestartProcess => self.execute_restart(plan, start).await,
            RecoveryAction::SwitchDependencyEndpoint => self.execute_switch(plan, start).await,
            RecoveryAction::ApplyCooldown => self.execute_cooldown(plan, start).await,
            RecoveryAction::AlertHuman | RecoveryAction::NoAction => {
                RecoveryResult::new(plan, RecoveryStatus::Skipped, start.elapsed(), "No action taken")
            }
        };

        tracing::info!(
            incident_id = %plan.incident_id,
            action = plan.action.as_str(),
            status = result.status.as_str(),
            method = ?result.method,
            duration_ms = result.duration.as_millis() as u64,
            "{}",
            result.message
        );
        result
    }

    async fn execute_restart(&self, plan: &RecoveryPlan, start: Instant) -> RecoveryResult {
        let config = self.config.load_full();
        let Some(agent) = plan.subject.as_deref().and_then(|s| config.agent(s)) else {
            return RecoveryResult::new(
                plan,
                RecoveryStatus::Failed,
                start.elapsed(),
                "Restart requested for unknown subject",
            );
        };

        self.lifecycle.mark_recovering(&agent.name);

        let backoff = plan.parameters.backoff_seconds.unwrap_or(0);
        if backoff > 0 {
            tracing::info!(subject = %agent.name, backoff_secs = backoff, "Waiting before restart");
            tokio::time::sleep(Duration::from_secs(backoff)).await;
        }

        self.record_restart(&agent.name);
        let limit = Duration::from_secs(config.recovery.command_timeout_secs);
        let target = restart_target(agent, plan.parameters.force);

        let mut tried = Vec::new();
        for method in restart_methods(agent) {
            tried.push(method.to_string());
            match self.control.restart(method, &target, limit).await {
                Ok(()) => {
                    return RecoveryResult::new(
                        plan,
                        RecoveryStatus::Success,
                        start.elapsed(),
                        format!("Restarted '{}' via {}", agent.name, method),
                    )
                    .with_method(method.as_str())
                    .with_tried(tried);
                }
                Err(e) => {
                    tracing::warn!(subject = %agent.name, method = %method, error = %e, "Restart method failed");
                }
            }
        }

        let err = RecoveryExecutionError::Exhausted { tried: tried.clone() };
        RecoveryResult::new(
            plan,
            RecoveryStatus::Failed,
            start.elapsed(),
            format!("Failed to restart '{}': {}", agent.name, err),
        )
        .with_tried(tried)
    }

    async fn execute_switch(&self, plan: &RecoveryPlan, start: Instant) -> RecoveryResult {
        let breaker = &self.dependency_breaker;
        match self.dependency.switch_endpoint().await {
            Ok(endpoint) => {
                self.breakers.record_success(breaker);
                RecoveryResult::new(
                    plan,
                    RecoveryStatus::Success,
                    start.elapsed(),
                    format!("Switched to dependency endpoint: {}", endpoint),
                )
                .with_method("switch_endpoint")
            }
            Err(DependencyError::NoAlternateEndpoint) => RecoveryResult::new(
                plan,
                RecoveryStatus::Partial,
                start.elapsed(),
                "No alternate dependency endpoint configured; staying on current endpoint",
            ),
            Err(e) => {
                self.breakers.record_failure(breaker);
                let err = RecoveryExecutionError::from(e);
                RecoveryResult::new(
                    plan,
                    RecoveryStatus::Failed,
                    start.elapsed(),
                    format!("Endpoint switch failed: {}", err),
                )
                .with_tried(vec!["switch_endpoint".to_string()])
            }
        }
    }

    async fn execute_cooldown(&self, plan: &RecoveryPlan, start: Instant) -> RecoveryResult {
        let cooldown = plan.parameters.cooldown_seconds.unwrap_or(0);
        tokio::time::sleep(Duration::from_secs(cooldown)).await;
        RecoveryResult::new(
            plan,
            RecoveryStatus::Success,
            start.elapsed(),
            format!("Applied {}s cooldown", cooldown),
        )
        .with_method("cooldown")
    }
}

fn restart_methods(agent: &AgentConfig) -> Vec<RestartMethod> {
    let mut methods = vec![RestartMethod::ServiceManager, RestartMethod::Container];
    if agent.restart_command.is_some() {
        methods.push(RestartMethod::CustomCommand);
    }
    methods
}

fn restart_target(agent: &AgentConfig, force: bool) -> RestartTarget {
    RestartTarget {
        service_name: agent.service_name().to_string(),
        command: agent.restart_command.clone(),
        force,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::DependencyResult;
    use crate::config::{shared, MonitorConfig};
    use crate::diagnosis::incident::{IncidentId, Severity};
    use crate::resilience::CircuitState;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedControl {
        succeed_on: Option<RestartMethod>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ServiceControl for ScriptedControl {
        async fn restart(&self, method: RestartMethod, _: &RestartTarget, _: Duration) -> Result<(), RecoveryExecutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(method) == self.succeed_on {
                Ok(())
            } else {
                Err(RecoveryExecutionError::CommandFailed {
                    method: method.to_string(),
                    detail: "exit 1".to_string(),
                })
            }
        }
    }

    struct FailingSwitch(fn() -> DependencyError);

    #[async_trait]
    impl DependencyControl for FailingSwitch {
        async fn switch_endpoint(&self) -> DependencyResult<String> {
            Err((self.0)())
        }
    }

    fn recoverer(succeed_on: Option<RestartMethod>, switch_error: fn() -> DependencyError) -> Recoverer {
        let mut config = MonitorConfig::default();
        let mut agent = AgentConfig::named("svc-A");
        agent.process_name = Some("svc-a".to_string());
        config.agents.push(agent);

        Recoverer::new(
            shared(config),
            Arc::new(ScriptedControl {
                succeed_on,
                calls: AtomicUsize::new(0),
            }),
            Arc::new(FailingSwitch(switch_error)),
            Arc::new(BreakerRegistry::default()),
            Arc::new(LifecycleTracker::new()),
        )
    }

    fn incident(incident_type: IncidentType, subject: Option<&str>, requires_human: bool) -> Incident {
        Incident {
            id: IncidentId::new(1, Utc::now()),
            incident_type,
            severity: Severity::Critical,
            subject: subject.map(String::from),
            description: "test".to_string(),
            evidence: BTreeMap::new(),
            suggested_actions: Vec::new(),
            requires_human,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_plan_mapping() {
        let r = recoverer(None, || DependencyError::NoAlternateEndpoint);

        let p = r.plan(&incident(IncidentType::ProcessCrash, Some("svc-A"), false));
        assert_eq!(p.action, RecoveryAction::RestartProcess);
        assert_eq!(p.parameters.backoff_seconds, Some(60));
        assert_eq!(p.parameters.attempt, Some(0));

        let p = r.plan(&incident(IncidentType::ProcessHang, Some("svc-A"), false));
        assert_eq!(p.action, RecoveryAction::RestartProcess);
        assert!(p.parameters.force);

        let p = r.plan(&incident(IncidentType::DependencyRateLimited, None, false));
        assert_eq!(p.action, RecoveryAction::ApplyCooldown);
        assert_eq!(p.parameters.cooldown_seconds, Some(60));

        let p = r.plan(&incident(IncidentType::DependencyUnavailable, None, false));
        assert_eq!(p.action, RecoveryAction::SwitchDependencyEndpoint);

        let p = r.plan(&incident(IncidentType::OperationFailures, Some("svc-A"), true));
        assert_eq!(p.action, RecoveryAction::AlertHuman);
        assert!(p.requires_human);

        let p = r.plan(&incident(IncidentType::HighLatency, None, false));
        assert_eq!(p.action, RecoveryAction::NoAction);

        let p = r.plan(&incident(IncidentType::ProcessCrash, Some("ghost"), false));
        assert_eq!(p.action, RecoveryAction::NoAction);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_cap_downgrades_to_alert_human() {
        let r = recoverer(Some(RestartMethod::ServiceManager), || DependencyError::NoAlternateEndpoint);
        let crash = incident(IncidentType::ProcessCrash, Some("svc-A"), false);

        for expected_backoff in [60, 120, 180] {
            let plan = r.plan(&crash);
            assert_eq!(plan.parameters.backoff_seconds, Some(expected_backoff));
            let result = r.execute(&plan).await;
            assert_eq!(result.status, RecoveryStatus::Success);
        }

        let plan = r.plan(&crash);
        assert_eq!(plan.action, RecoveryAction::AlertHuman);
        assert!(plan.reason.contains("Max restarts (3)"));

        let result = r.execute(&plan).await;
        assert_eq!(result.status, RecoveryStatus::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_methods_failing_is_failed_with_tried_list() {
        let r = recoverer(None, || DependencyError::NoAlternateEndpoint);
        let plan = r.plan(&incident(IncidentType::ProcessHang, Some("svc-A"), false));
        let result = r.execute(&plan).await;

        assert_eq!(result.status, RecoveryStatus::Failed);
        assert_eq!(result.tried, vec!["systemctl", "docker"]);
        assert_eq!(r.restart_count("svc-A"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_without_alternate_is_partial() {
        let r = recoverer(None, || DependencyError::NoAlternateEndpoint);
        let plan = r.plan(&incident(IncidentType::DependencyUnavailable, None, false));
        assert_eq!(r.execute(&plan).await.status, RecoveryStatus::Partial);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_skips_dependency_actions() {
        let r = recoverer(None, || DependencyError::Unavailable("down".into()));
        let plan = r.plan(&incident(IncidentType::DependencyUnavailable, None, false));

        for _ in 0..5 {
            assert_eq!(r.execute(&plan).await.status, RecoveryStatus::Failed);
        }
        assert_eq!(r.breakers.state("chain-rpc"), Some(CircuitState::Open));

        let skipped = r.execute(&plan).await;
        assert_eq!(skipped.status, RecoveryStatus::Skipped);
        assert!(skipped.message.contains("Circuit breaker open"));

        let cooldown = r.plan(&incident(IncidentType::DependencyRateLimited, None, false));
        assert_eq!(r.execute(&cooldown).await.status, RecoveryStatus::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renamed_dependency_keeps_open_breaker() {
        let r = recoverer(None, || DependencyError::Unavailable("down".into()));
        let plan = r.plan(&incident(IncidentType::DependencyUnavailable, None, false));
        for _ in 0..5 {
            r.execute(&plan).await;
        }
        assert_eq!(r.breakers.state("chain-rpc"), Some(CircuitState::Open));

        let mut renamed = MonitorConfig::clone(&r.config.load());
        renamed.dependency.name = "chain-rpc-renamed".to_string();
        r.config.store(Arc::new(renamed));

        let cooldown = r.plan(&incident(IncidentType::DependencyRateLimited, None, false));
        let result = r.execute(&cooldown).await;
        assert_eq!(result.status, RecoveryStatus::Skipped);
        assert!(r.breakers.state("chain-rpc-renamed").is_none());
    }

    #[tokio::test]
    async fn test_poisoned_ledger_keeps_counting() {
        let r = Arc::new(recoverer(None, || DependencyError::NoAlternateEndpoint));
        r.record_restart("svc-A");

        let poisoner = Arc::clone(&r);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.ledger.lock().unwrap();
            panic!("poison the ledger");
        })
        .join();

        assert!(r.ledger.is_poisoned());
        assert_eq!(r.restart_count("svc-A"), 1);
        let plan = r.plan(&incident(IncidentType::ProcessCrash, Some("svc-A"), false));
        assert_eq!(plan.parameters.attempt, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_requires_human_is_never_executed() {
        let r = recoverer(Some(RestartMethod::ServiceManager), || DependencyError::NoAlternateEndpoint);
        let mut plan = r.plan(&incident(IncidentType::ProcessCrash, Some("svc-A"), false));
        plan.requires_human = true;

        let result = r.execute(&plan).await;
        assert_eq!(result.status, RecoveryStatus::Skipped);
        assert_eq!(r.restart_count("svc-A"), 0);
    }
}
