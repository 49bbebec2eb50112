//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the monitor.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the agent monitor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    /// Monitored agent processes.
    pub agents: Vec<AgentConfig>,

    /// The external blockchain RPC dependency.
    pub dependency: DependencyConfig,

    /// Probe timeouts and classification thresholds.
    pub probes: ProbeConfig,

    /// Circuit breaker settings for dependency-targeted actions.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Recovery execution settings.
    pub recovery: RecoveryConfig,

    /// Post-action verification settings.
    pub verification: VerificationConfig,

    /// Escalation scheduler settings.
    pub scheduler: SchedulerConfig,

    /// Tier1 advisory service.
    pub advisory: AdvisoryConfig,

    /// Human alert delivery.
    pub notifier: NotifierConfig,

    /// External signal quarantine.
    pub quarantine: QuarantineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Status API.
    pub admin: AdminConfig,

    /// Extensions to start, by registered name.
    pub extensions: Vec<String>,
}

impl MonitorConfig {
    /// Look up an agent by name.
    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.name == name)
    }
}

/// A monitored agent process.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Unique agent identifier, used as the incident subject.
    pub name: String,

    /// Service manager / container / process name.
    #[serde(default)]
    pub process_name: Option<String>,

    /// HTTP health check URL.
    #[serde(default)]
    pub health_endpoint: Option<String>,

    /// On-chain address whose recent operations are checked for failures.
    #[serde(default)]
    pub operator_address: Option<String>,

    /// Custom restart command, tried after the service manager and container.
    #[serde(default)]
    pub restart_command: Option<String>,

    /// Restarts allowed inside the rolling window before a human is paged.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Base restart backoff; attempt `n` waits `base * (n + 1)`.
    #[serde(default = "default_restart_backoff_secs")]
    pub restart_backoff_secs: u64,
}

fn default_max_restarts() -> u32 {
    3
}

fn default_restart_backoff_secs() -> u64 {
    60
}

impl AgentConfig {
    /// Minimal agent with only a name; probes are filled in by the caller.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            process_name: None,
            health_endpoint: None,
            operator_address: None,
            restart_command: None,
            max_restarts: default_max_restarts(),
            restart_backoff_secs: default_restart_backoff_secs(),
        }
    }

    /// Name used for restart commands; falls back to the agent name.
    pub fn service_name(&self) -> &str {
        self.process_name.as_deref().unwrap_or(&self.name)
    }
}

/// Blockchain RPC dependency configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DependencyConfig {
    /// Dependency name, also the circuit breaker key.
    pub name: String,

    /// Primary JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Alternate endpoints used by `SwitchDependencyEndpoint`.
    pub failover_urls: Vec<String>,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Expected block production interval, used by the Tier0 stall heuristic.
    pub block_time_ms: u64,

    /// How many recent blocks are scanned for failed operations.
    pub operation_scan_blocks: u64,

    /// Outgoing RPC request rate.
    pub requests_per_second: f64,

    /// Outgoing RPC burst capacity.
    pub burst: f64,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            name: "chain-rpc".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            rpc_timeout_secs: 10,
            block_time_ms: 12_000,
            operation_scan_blocks: 20,
            requests_per_second: 5.0,
            burst: 20.0,
        }
    }
}

/// Probe settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Upper bound for every individual probe call.
    pub timeout_secs: u64,

    /// Endpoint latency above which an agent is flagged.
    pub endpoint_latency_ms: f64,

    /// Dependency latency above which the dependency is flagged.
    pub dependency_latency_ms: f64,

    /// Number of recent operations inspected per agent.
    pub operation_failure_limit: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            endpoint_latency_ms: 5000.0,
            dependency_latency_ms: 2000.0,
            operation_failure_limit: 5,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Half-open successes that close the circuit.
    pub success_threshold: u32,

    /// Time since the last failure before a half-open probe is allowed.
    pub timeout_seconds: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_seconds: 30.0,
        }
    }
}

/// Recovery execution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Rolling window for the per-agent restart counter.
    pub restart_window_mins: u64,

    /// Cooldown applied when the dependency is rate limited.
    pub cooldown_secs: u64,

    /// Timeout for each restart command.
    pub command_timeout_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            restart_window_mins: 30,
            cooldown_secs: 60,
            command_timeout_secs: 60,
        }
    }
}

/// Verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Settle delay between executing a remediation and re-checking it.
    pub settle_delay_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self { settle_delay_secs: 10 }
    }
}

/// Escalation scheduler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Sweep interval in the default state.
    pub default_interval_secs: u64,

    /// Sweep interval while the last cycle produced incidents.
    pub incident_interval_secs: u64,

    /// Sweep interval once continuously healthy past the threshold.
    pub stable_interval_secs: u64,

    /// Continuous healthy time before switching to the stable interval.
    pub stable_threshold_mins: u64,

    /// Tier0 tick.
    pub tier0_tick_secs: u64,

    /// Minimum spacing between Tier1 advisory calls.
    pub tier1_window_secs: u64,

    /// Minimum spacing between full Tier2 cycles.
    pub tier2_window_secs: u64,

    /// Pause after a failed cycle before resuming.
    pub error_pause_secs: u64,

    /// 1-minute load average above which Tier0 alerts.
    pub max_load_average: f64,

    /// Memory usage percentage above which Tier0 alerts.
    pub max_memory_percent: f64,

    /// Observed/expected progress ratio below which the dependency is stalled.
    pub stall_ratio: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: 600,
            incident_interval_secs: 120,
            stable_interval_secs: 1800,
            stable_threshold_mins: 30,
            tier0_tick_secs: 30,
            tier1_window_secs: 120,
            tier2_window_secs: 300,
            error_pause_secs: 30,
            max_load_average: 10.0,
            max_memory_percent: 90.0,
            stall_ratio: 0.3,
        }
    }
}

/// Tier1 advisory service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// Advisory endpoint. When unset every Tier1 call fails safe to escalation.
    pub url: Option<String>,

    /// Environment variable holding the advisory API key.
    pub api_key_env: String,

    /// Advisory call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key_env: "MEDIC_ADVISORY_API_KEY".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Human alert delivery.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Webhook receiving JSON alerts. Alerts are only logged when unset.
    pub webhook_url: Option<String>,

    /// Duplicate alerts for the same subject and kind are dropped in this window.
    pub suppression_window_secs: u64,

    /// Delivery attempts per alert.
    pub max_attempts: u32,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            suppression_window_secs: 300,
            max_attempts: 3,
        }
    }
}

/// External signal quarantine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct QuarantineConfig {
    /// JSON file the quarantine store is loaded from and saved to.
    pub persistence_path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Metrics endpoint bind address, used by the `prometheus` extension.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Status API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the status API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Status API bind address.
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            request_timeout_secs: 10,
        }
    }
}
