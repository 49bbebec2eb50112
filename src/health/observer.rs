//! Observer: one consistent `SystemStatus` per call.
//!
//! Every probe runs under the configured probe timeout. A failing probe becomes an
//! error entry on its subject; it never aborts the snapshot. Probes for different
//! subjects run concurrently and the snapshot is assembled once all have returned
//! or timed out.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::Instant;

use crate::blockchain::types::{DependencyError, DependencyHealth, DependencyProbe};
use crate::config::{AgentConfig, ProbeConfig, SharedConfig};
use crate::health::probe::{EndpointProbe, ProcessProbe};
use crate::health::types::{
    EndpointCheck, HealthCheckResult, Observation, OperationFailure, ProbeError, ProcessCheck,
    SystemStatus,
};
use crate::resilience::with_deadline;

pub struct Observer {
    config: SharedConfig,
    process: Arc<dyn ProcessProbe>,
    endpoint: Arc<dyn EndpointProbe>,
    dependency: Arc<dyn DependencyProbe>,
}

impl Observer {
    pub fn new(
        config: SharedConfig,
        process: Arc<dyn ProcessProbe>,
        endpoint: Arc<dyn EndpointProbe>,
        dependency: Arc<dyn DependencyProbe>,
    ) -> Self {
        Self {
            config,
            process,
            endpoint,
            dependency,
        }
    }

    /// Query every subject and the dependency exactly once.
    pub async fn observe(&self) -> SystemStatus {
        let config = self.config.load_full();
        let probes = &config.probes;

        let checks = config.agents.iter().map(|agent| self.check_agent(agent, probes));
        let (results, dependency) =
            tokio::join!(join_all(checks), self.check_dependency(probes.timeout()));

        let subjects: BTreeMap<_, _> = results
            .into_iter()
            .map(|r| (r.subject.clone(), r))
            .collect();

        let status = SystemStatus::new(subjects, dependency);
        tracing::debug!(
            subjects = status.subjects.len(),
            dependency_healthy = status.dependency.healthy,
            active_incidents = status.active_incidents,
            "Snapshot assembled"
        );
        status
    }

    /// All checks for one subject.
    pub async fn check_agent(&self, agent: &AgentConfig, probes: &ProbeConfig) -> HealthCheckResult {
        let limit = probes.timeout();
        let (process, endpoint, operations) = tokio::join!(
            self.check_process(agent, limit),
            self.check_endpoint(agent, limit),
            self.check_operations(agent, probes.operation_failure_limit, limit),
        );
        HealthCheckResult::new(
            &agent.name,
            process,
            endpoint,
            operations,
            probes.endpoint_latency_ms,
        )
    }

    /// Process liveness, `None` when the subject has no process configured.
    pub async fn check_process(
        &self,
        agent: &AgentConfig,
        limit: Duration,
    ) -> Option<Observation<ProcessCheck>> {
        let name = agent.process_name.as_deref()?;
        let result = with_deadline(limit, self.process.is_running(name))
            .await
            .unwrap_or(Err(ProbeError::Timeout(limit)));
        observation(result)
    }

    /// Endpoint health, `None` when the subject has no endpoint configured.
    pub async fn check_endpoint(&self, agent: &AgentConfig, limit: Duration) -> Option<EndpointCheck> {
        let url = agent.health_endpoint.as_deref()?;
        let start = Instant::now();
        let result = with_deadline(limit, self.endpoint.check_endpoint(url))
            .await
            .unwrap_or(Err(ProbeError::Timeout(limit)));

        match result {
            Ok(check) => Some(check),
            Err(ProbeError::NotConfigured) => None,
            Err(error) => Some(EndpointCheck {
                healthy: false,
                status_code: None,
                latency_ms: start.elapsed().as_secs_f64() * 1000.0,
                error: Some(error),
            }),
        }
    }

    async fn check_operations(
        &self,
        agent: &AgentConfig,
        max: usize,
        limit: Duration,
    ) -> Option<Observation<Vec<OperationFailure>>> {
        let address = agent.operator_address.as_deref()?;
        let result = with_deadline(limit, self.dependency.recent_operation_failures(address, max))
            .await
            .unwrap_or(Err(ProbeError::Timeout(limit)));
        observation(result)
    }

    /// Dependency health under the probe deadline; failures are captured in the result.
    pub async fn check_dependency(&self, limit: Duration) -> DependencyHealth {
        let start = Instant::now();
        match with_deadline(limit, self.dependency.dependency_health()).await {
            Ok(health) => health,
            Err(_) => DependencyHealth::unhealthy(
                self.dependency.current_endpoint(),
                start.elapsed().as_secs_f64() * 1000.0,
                DependencyError::Timeout(limit.as_secs()).to_string(),
            ),
        }
    }
}

fn observation<T>(result: Result<T, ProbeError>) -> Option<Observation<T>> {
    match result {
        Ok(value) => Some(Observation::Confirmed(value)),
        Err(ProbeError::NotConfigured) => None,
        Err(error) => Some(Observation::Indeterminate(error)),
    }
}
