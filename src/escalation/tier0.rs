//! Tier0: free local heuristics run on every tick.
//!
//! # Checks
//! - Host load average and memory usage against configured ceilings
//! - Dependency liveness plus a progress-stall heuristic
//! - Newly verified external signals from the quarantine gate
//!
//! Any reason raised makes the tick an alert. Alerts increment a
//! consecutive-failure counter; a clean tick resets it.
//!
//! Verified signals keep being raised until `acknowledge_signals` marks them,
//! which the scheduler does only once Tier1 has actually seen them.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tokio::time::Instant;

use crate::blockchain::types::DependencyProbe;
use crate::config::{SchedulerConfig, SharedConfig};
use crate::health::types::ProbeError;
use crate::quarantine::QuarantineGate;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostSample {
    pub load_average: f64,
    pub memory_percent: f64,
}

/// Source of local host load figures.
pub trait HostMetrics: Send + Sync {
    fn sample(&self) -> Result<HostSample, ProbeError>;
}

/// Host metrics read through `sysinfo`.
pub struct SysinfoHost {
    system: Mutex<System>,
}

impl SysinfoHost {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMetrics for SysinfoHost {
    fn sample(&self) -> Result<HostSample, ProbeError> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| ProbeError::Failed("host metrics lock poisoned".to_string()))?;
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return Err(ProbeError::Failed("total memory unavailable".to_string()));
        }
        Ok(HostSample {
            load_average: System::load_average().one,
            memory_percent: system.used_memory() as f64 / total as f64 * 100.0,
        })
    }
}

/// Whether the dependency advanced far less than its known rate predicts.
///
/// Expected progress is `elapsed / block_time`; stalled when the observed
/// progress is below `ratio` of that. Under one expected block is never a stall.
pub fn is_stalled(observed: u64, elapsed_ms: u128, block_time_ms: u64, ratio: f64) -> bool {
    if block_time_ms == 0 {
        return false;
    }
    let expected = elapsed_ms as f64 / block_time_ms as f64;
    expected >= 1.0 && (observed as f64) < ratio * expected
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier0Report {
    pub reasons: Vec<String>,
    pub consecutive_failures: u32,
    pub host: Option<HostSample>,
    pub dependency_position: Option<u64>,
    /// Quarantine ids behind the signal reasons in this report.
    #[serde(default)]
    pub signal_ids: Vec<String>,
}

impl Tier0Report {
    pub fn is_alert(&self) -> bool {
        !self.reasons.is_empty()
    }
}

pub struct Tier0Monitor {
    config: SharedConfig,
    host: Arc<dyn HostMetrics>,
    dependency: Arc<dyn DependencyProbe>,
    quarantine: Option<Arc<QuarantineGate>>,
    last_position: Option<(u64, Instant)>,
    consecutive_failures: u32,
}

impl Tier0Monitor {
    pub fn new(
        config: SharedConfig,
        host: Arc<dyn HostMetrics>,
        dependency: Arc<dyn DependencyProbe>,
        quarantine: Option<Arc<QuarantineGate>>,
    ) -> Self {
        Self {
            config,
            host,
            dependency,
            quarantine,
            last_position: None,
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Run every Tier0 check once. `extra` carries reasons found elsewhere this tick.
    pub async fn check(&mut self, extra: Vec<String>) -> Tier0Report {
        let config = self.config.load_full();
        let scheduler = &config.scheduler;
        let mut reasons = extra;

        let host = match self.host.sample() {
            Ok(sample) => {
                reasons.extend(host_reasons(sample, scheduler));
                Some(sample)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Host metrics unavailable");
                None
            }
        };

        let health = self.dependency.dependency_health().await;
        let dependency_position = health.position;
        if !health.healthy {
            reasons.push(format!(
                "dependency unhealthy: {}",
                health.error.as_deref().unwrap_or("unknown error")
            ));
        } else if let Some(position) = health.position {
            let now = Instant::now();
            if let Some((previous, at)) = self.last_position {
                let elapsed_ms = now.duration_since(at).as_millis();
                let observed = position.saturating_sub(previous);
                if is_stalled(observed, elapsed_ms, config.dependency.block_time_ms, scheduler.stall_ratio) {
                    reasons.push(format!(
                        "dependency stalled: advanced {} in {}ms",
                        observed, elapsed_ms
                    ));
                }
            }
            self.last_position = Some((position, now));
        }

        let mut signal_ids = Vec::new();
        if let Some(gate) = &self.quarantine {
            for item in gate.unacted_verified() {
                reasons.push(format!(
                    "verified {} signal {} from {} source(s)",
                    item.data_type,
                    item.id,
                    item.sources.len()
                ));
                signal_ids.push(item.id);
            }
        }

        if reasons.is_empty() {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            tracing::warn!(
                consecutive_failures = self.consecutive_failures,
                reasons = ?reasons,
                "Tier0 alert"
            );
        }

        Tier0Report {
            reasons,
            consecutive_failures: self.consecutive_failures,
            host,
            dependency_position,
            signal_ids,
        }
    }

    /// Mark signals as consumed once an advisory verdict has covered them.
    pub fn acknowledge_signals(&self, ids: &[String]) {
        if let Some(gate) = &self.quarantine {
            if !ids.is_empty() {
                let marked = gate.mark_acted_on(ids);
                tracing::debug!(marked, "Verified signals acknowledged");
            }
        }
    }
}

fn host_reasons(sample: HostSample, config: &SchedulerConfig) -> Vec<String> {
    let mut reasons = Vec::new();
    if sample.load_average > config.max_load_average {
        reasons.push(format!(
            "load average {:.2} above {:.2}",
            sample.load_average, config.max_load_average
        ));
    }
    if sample.memory_percent > config.max_memory_percent {
        reasons.push(format!(
            "memory usage {:.1}% above {:.1}%",
            sample.memory_percent, config.max_memory_percent
        ));
    }
    reasons
}
