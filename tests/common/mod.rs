//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use agent_medic::blockchain::{
    DependencyControl, DependencyError, DependencyHealth, DependencyProbe,
};
use agent_medic::config::{shared, AgentConfig, MonitorConfig, SharedConfig};
use agent_medic::diagnosis::Incident;
use agent_medic::escalation::{
    Advisory, AdvisoryAction, AdvisoryError, AdvisoryRequest, AdvisorySeverity, AdvisoryVerdict,
    CycleError, CycleReport, CycleRunner, HostMetrics, HostSample, MonitorCycle,
};
use agent_medic::health::{
    EndpointCheck, EndpointProbe, LifecycleTracker, Observer, ProbeError, ProcessCheck,
    ProcessProbe, SystemStatus,
};
use agent_medic::health::types::OperationFailure;
use agent_medic::notify::{AlertRouter, HumanAlert, HumanNotifier};
use agent_medic::observability::MetricsSink;
use agent_medic::recovery::{
    RecoveryExecutionError, Recoverer, RestartMethod, RestartTarget, ServiceControl,
};
use agent_medic::resilience::BreakerRegistry;
use agent_medic::verification::Verifier;

/// One agent "svc-A" managed as service "svc-a", with no endpoint or address.
pub fn monitor_config() -> MonitorConfig {
    let mut agent = AgentConfig::named("svc-A");
    agent.process_name = Some("svc-a".to_string());
    MonitorConfig {
        agents: vec![agent],
        ..MonitorConfig::default()
    }
}

/// Process table keyed by service name. Names can be set to error or never answer.
#[derive(Default)]
pub struct FakeProcesses {
    running: Mutex<HashMap<String, bool>>,
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    pub calls: AtomicU32,
}

impl FakeProcesses {
    pub fn set(&self, name: &str, running: bool) {
        self.running.lock().unwrap().insert(name.to_string(), running);
    }

    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn hang(&self, name: &str) {
        self.hanging.lock().unwrap().insert(name.to_string());
    }
}

#[async_trait]
impl ProcessProbe for FakeProcesses {
    async fn is_running(&self, process_name: &str) -> Result<ProcessCheck, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hangs = self.hanging.lock().unwrap().contains(process_name);
        if hangs {
            std::future::pending::<()>().await;
        }
        if self.failing.lock().unwrap().contains(process_name) {
            return Err(ProbeError::Failed("permission denied".to_string()));
        }
        let running = self
            .running
            .lock()
            .unwrap()
            .get(process_name)
            .copied()
            .unwrap_or(false);
        Ok(ProcessCheck {
            running,
            method: running.then(|| "fake".to_string()),
        })
    }
}

/// Every endpoint answers 200 quickly.
pub struct HealthyEndpoints;

#[async_trait]
impl EndpointProbe for HealthyEndpoints {
    async fn check_endpoint(&self, _url: &str) -> Result<EndpointCheck, ProbeError> {
        Ok(EndpointCheck {
            healthy: true,
            status_code: Some(200),
            latency_ms: 5.0,
            error: None,
        })
    }
}

/// Dependency that replays scripted health answers; the last one repeats.
pub struct FakeDependency {
    script: Mutex<VecDeque<DependencyHealth>>,
    hang: AtomicBool,
    pub health_calls: AtomicU32,
    pub switches: AtomicU32,
}

impl FakeDependency {
    pub fn healthy() -> Self {
        Self::scripted(vec![DependencyHealth::healthy("http://rpc-1", 100, 20.0)])
    }

    pub fn scripted(script: Vec<DependencyHealth>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            hang: AtomicBool::new(false),
            health_calls: AtomicU32::new(0),
            switches: AtomicU32::new(0),
        }
    }

    /// Health queries never answer.
    pub fn hanging() -> Self {
        let dependency = Self::healthy();
        dependency.hang.store(true, Ordering::SeqCst);
        dependency
    }
}

#[async_trait]
impl DependencyProbe for FakeDependency {
    fn current_endpoint(&self) -> String {
        "http://rpc-1".to_string()
    }

    async fn dependency_health(&self) -> DependencyHealth {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }

    async fn recent_operation_failures(
        &self,
        _address: &str,
        _limit: usize,
    ) -> Result<Vec<OperationFailure>, ProbeError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl DependencyControl for FakeDependency {
    async fn switch_endpoint(&self) -> Result<String, DependencyError> {
        self.switches.fetch_add(1, Ordering::SeqCst);
        Err(DependencyError::NoAlternateEndpoint)
    }
}

/// Restarts succeed on the first method and bring the process back.
pub struct FakeControl {
    processes: Arc<FakeProcesses>,
    pub restarts: Mutex<Vec<(RestartMethod, String)>>,
}

impl FakeControl {
    pub fn new(processes: Arc<FakeProcesses>) -> Self {
        Self {
            processes,
            restarts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ServiceControl for FakeControl {
    async fn restart(
        &self,
        method: RestartMethod,
        target: &RestartTarget,
        _limit: Duration,
    ) -> Result<(), RecoveryExecutionError> {
        self.restarts
            .lock()
            .unwrap()
            .push((method, target.service_name.clone()));
        self.processes.set(&target.service_name, true);
        Ok(())
    }
}

/// Captures every delivered alert.
#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<HumanAlert>>,
}

impl HumanNotifier for RecordingNotifier {
    fn channel(&self) -> &'static str {
        "recording"
    }

    fn notify(&self, alert: &HumanAlert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}

/// Fixed host figures.
pub struct FakeHost(pub HostSample);

impl FakeHost {
    pub fn calm() -> Self {
        Self(HostSample {
            load_average: 0.5,
            memory_percent: 40.0,
        })
    }

    pub fn overloaded() -> Self {
        Self(HostSample {
            load_average: 50.0,
            memory_percent: 40.0,
        })
    }
}

impl HostMetrics for FakeHost {
    fn sample(&self) -> Result<HostSample, ProbeError> {
        Ok(self.0)
    }
}

/// Advisory that always answers with one verdict, or always fails.
pub struct CountingAdvisory {
    verdict: Result<AdvisoryVerdict, AdvisoryError>,
    pub calls: AtomicU32,
    pub requests: Mutex<Vec<AdvisoryRequest>>,
}

impl CountingAdvisory {
    pub fn escalating() -> Self {
        Self::answering(AdvisoryVerdict {
            severity: AdvisorySeverity::Critical,
            summary: "host overloaded".to_string(),
            action: AdvisoryAction::Escalate,
            escalate: true,
            reason: "load".to_string(),
        })
    }

    pub fn answering(verdict: AdvisoryVerdict) -> Self {
        Self {
            verdict: Ok(verdict),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            verdict: Err(AdvisoryError::Transport("connection refused".to_string())),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Advisory for CountingAdvisory {
    async fn assess(&self, request: &AdvisoryRequest) -> Result<AdvisoryVerdict, AdvisoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.verdict.clone()
    }
}

/// Cycle runner that counts calls and panics on the chosen ones.
#[derive(Default)]
pub struct ScriptedCycle {
    pub sweeps: AtomicU32,
    pub cycles: AtomicU32,
    panic_on: Mutex<Vec<u32>>,
}

impl ScriptedCycle {
    pub fn panicking_on(calls: Vec<u32>) -> Self {
        Self {
            panic_on: Mutex::new(calls),
            ..Self::default()
        }
    }

    pub fn cycles(&self) -> u32 {
        self.cycles.load(Ordering::SeqCst)
    }

    fn status() -> SystemStatus {
        SystemStatus::new(
            Default::default(),
            DependencyHealth::healthy("http://rpc-1", 100, 20.0),
        )
    }
}

#[async_trait]
impl CycleRunner for ScriptedCycle {
    async fn sweep(&self) -> (SystemStatus, Vec<Incident>) {
        self.sweeps.fetch_add(1, Ordering::SeqCst);
        (Self::status(), Vec::new())
    }

    async fn full_cycle(&self, trigger: &str) -> Result<CycleReport, CycleError> {
        let n = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on.lock().unwrap().contains(&n) {
            panic!("scripted failure in cycle {}", n);
        }
        Ok(CycleReport {
            cycle_id: uuid::Uuid::new_v4(),
            trigger: trigger.to_string(),
            status: Self::status(),
            incidents: Vec::new(),
            recoveries: Vec::new(),
            verifications: Vec::new(),
            completed_at: chrono::Utc::now(),
        })
    }
}

/// A real monitoring pipeline over fakes.
pub struct Harness {
    pub config: SharedConfig,
    pub processes: Arc<FakeProcesses>,
    pub dependency: Arc<FakeDependency>,
    pub control: Arc<FakeControl>,
    pub breakers: Arc<BreakerRegistry>,
    pub lifecycle: Arc<LifecycleTracker>,
    pub sink: Arc<MetricsSink>,
    pub notifier: Arc<RecordingNotifier>,
    pub observer: Arc<Observer>,
    pub recoverer: Arc<Recoverer>,
    pub cycle: Arc<MonitorCycle>,
}

impl Harness {
    pub fn new(config: MonitorConfig, dependency: FakeDependency) -> Self {
        let breaker_config = config.circuit_breaker.clone();
        let config = shared(config);
        let processes = Arc::new(FakeProcesses::default());
        let dependency = Arc::new(dependency);
        let control = Arc::new(FakeControl::new(processes.clone()));
        let breakers = Arc::new(BreakerRegistry::new(breaker_config));
        let lifecycle = Arc::new(LifecycleTracker::new());
        let sink = Arc::new(MetricsSink::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let observer = Arc::new(Observer::new(
            config.clone(),
            processes.clone(),
            Arc::new(HealthyEndpoints),
            dependency.clone(),
        ));
        let recoverer = Arc::new(Recoverer::new(
            config.clone(),
            control.clone(),
            dependency.clone(),
            breakers.clone(),
            lifecycle.clone(),
        ));
        let verifier = Arc::new(Verifier::new(
            config.clone(),
            observer.clone(),
            breakers.clone(),
            lifecycle.clone(),
        ));
        let alerts = Arc::new(AlertRouter::new(config.clone(), vec![notifier.clone()]));
        let cycle = Arc::new(MonitorCycle::new(
            config.clone(),
            observer.clone(),
            recoverer.clone(),
            verifier,
            lifecycle.clone(),
            sink.clone(),
            alerts,
        ));

        Self {
            config,
            processes,
            dependency,
            control,
            breakers,
            lifecycle,
            sink,
            notifier,
            observer,
            recoverer,
            cycle,
        }
    }
}
