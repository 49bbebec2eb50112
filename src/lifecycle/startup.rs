//! Startup orchestration.
//!
//! Builds every collaborator exactly once and hands out shared handles; there
//! are no global registries.
//!
//! # Order
//! 1. Config (file or defaults), validated
//! 2. Dependency client, probes, breakers, lifecycle tracker
//! 3. Observer, Recoverer, Verifier, sink, alerts, quarantine
//! 4. Cycle, then (for `run`) Tier0, advisory and the scheduler

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::admin::AdminState;
use crate::blockchain::{ChainClient, DependencyError};
use crate::config::{load_config, shared, ConfigError, MonitorConfig, SharedConfig};
use crate::escalation::{
    AdvisoryError, EscalationScheduler, HttpAdvisory, MonitorCycle, SnapshotHandle, SysinfoHost,
    Tier0Monitor,
};
use crate::extensions::{ExtensionContext, ExtensionError};
use crate::health::{HttpEndpointProbe, LifecycleTracker, Observer, SystemProcessProbe};
use crate::notify::AlertRouter;
use crate::observability::MetricsSink;
use crate::quarantine::{QuarantineError, QuarantineGate};
use crate::recovery::{Recoverer, SystemServiceControl};
use crate::resilience::BreakerRegistry;
use crate::verification::Verifier;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dependency client error: {0}")]
    Dependency(#[from] DependencyError),

    #[error("Quarantine store error: {0}")]
    Quarantine(#[from] QuarantineError),

    #[error("Advisory client error: {0}")]
    Advisory(#[from] AdvisoryError),

    #[error("Extension error: {0}")]
    Extension(#[from] ExtensionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the running configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Report the source. Call once logging is up.
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => tracing::info!(path = ?path, "Configuration loaded"),
            ConfigSource::Defaults => tracing::warn!("No config file given, using defaults"),
        }
    }
}

/// Load the config file, or fall back to validated defaults when none is given.
///
/// Nothing is logged here since logging is configured from the result.
pub fn load_or_default(path: Option<&Path>) -> Result<(MonitorConfig, ConfigSource), ConfigError> {
    match path {
        Some(path) => Ok((load_config(path)?, ConfigSource::File(path.to_path_buf()))),
        None => Ok((MonitorConfig::default(), ConfigSource::Defaults)),
    }
}

/// The constructed monitor: one instance of every collaborator.
pub struct Medic {
    pub config: SharedConfig,
    pub config_path: Option<PathBuf>,
    pub dependency: Arc<ChainClient>,
    pub breakers: Arc<BreakerRegistry>,
    pub lifecycle: Arc<LifecycleTracker>,
    pub sink: Arc<MetricsSink>,
    pub quarantine: Arc<QuarantineGate>,
    pub alerts: Arc<AlertRouter>,
    pub cycle: Arc<MonitorCycle>,
}

impl Medic {
    pub fn build(config: MonitorConfig, config_path: Option<PathBuf>) -> Result<Self, StartupError> {
        let probe_timeout = config.probes.timeout();
        let quarantine_path = config.quarantine.persistence_path.clone().map(PathBuf::from);
        let breaker_config = config.circuit_breaker.clone();
        let dependency = Arc::new(ChainClient::new(&config.dependency)?);
        let config = shared(config);

        let breakers = Arc::new(BreakerRegistry::new(breaker_config));
        let lifecycle = Arc::new(LifecycleTracker::new());
        let observer = Arc::new(Observer::new(
            config.clone(),
            Arc::new(SystemProcessProbe::new(probe_timeout)),
            Arc::new(HttpEndpointProbe::new(probe_timeout)),
            dependency.clone(),
        ));
        let recoverer = Arc::new(Recoverer::new(
            config.clone(),
            Arc::new(SystemServiceControl),
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
        let sink = Arc::new(MetricsSink::new());
        let alerts = Arc::new(AlertRouter::from_config(config.clone()));
        let quarantine = Arc::new(QuarantineGate::load(quarantine_path)?);

        let cycle = Arc::new(MonitorCycle::new(
            config.clone(),
            observer,
            recoverer,
            verifier,
            lifecycle.clone(),
            sink.clone(),
            alerts.clone(),
        ));

        tracing::info!(
            agents = config.load().agents.len(),
            dependency = %config.load().dependency.name,
            "Monitor assembled"
        );

        Ok(Self {
            config,
            config_path,
            dependency,
            breakers,
            lifecycle,
            sink,
            quarantine,
            alerts,
            cycle,
        })
    }

    /// Build the escalation scheduler around the shared cycle.
    pub fn scheduler(&self) -> Result<EscalationScheduler, StartupError> {
        let tier0 = Tier0Monitor::new(
            self.config.clone(),
            Arc::new(SysinfoHost::new()),
            self.dependency.clone(),
            Some(self.quarantine.clone()),
        );
        let advisory = Arc::new(HttpAdvisory::from_config(&self.config.load().advisory)?);
        Ok(EscalationScheduler::new(
            self.config.clone(),
            tier0,
            advisory,
            self.cycle.clone(),
            self.lifecycle.clone(),
        )
        .with_alerts(self.alerts.clone()))
    }

    pub fn admin_state(&self, snapshot: SnapshotHandle) -> AdminState {
        AdminState {
            config: self.config.clone(),
            snapshot,
            breakers: self.breakers.clone(),
            sink: self.sink.clone(),
            quarantine: self.quarantine.clone(),
        }
    }

    pub fn extension_context(&self) -> ExtensionContext {
        ExtensionContext {
            config: self.config.clone(),
            config_path: self.config_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_or_default_reports_source() {
        let (config, source) = load_or_default(None).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config.probes.timeout_secs, 10);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[verification]\nsettle_delay_secs = 3").unwrap();
        let (config, source) = load_or_default(Some(file.path())).unwrap();
        assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));
        assert_eq!(config.verification.settle_delay_secs, 3);
    }
}
