//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;

use crate::config::loader::load_config;
use crate::config::schema::MonitorConfig;

/// Live configuration shared by every collaborator; read at use.
pub type SharedConfig = Arc<ArcSwap<MonitorConfig>>;

/// Wrap a loaded configuration for sharing.
pub fn shared(config: MonitorConfig) -> SharedConfig {
    Arc::new(ArcSwap::from_pointee(config))
}

/// Watches the configuration file and swaps validated reloads into a [`SharedConfig`].
pub struct ConfigWatcher {
    path: PathBuf,
    target: SharedConfig,
}

impl ConfigWatcher {
    pub fn new(path: &Path, target: SharedConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            target,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let target = self.target.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        reload_into(&path, &target);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn differs<T: Serialize>(a: &T, b: &T) -> bool {
    serde_json::to_value(a).ok() != serde_json::to_value(b).ok()
}

/// Settings captured when collaborators are built. Changing them needs a restart.
pub fn startup_only_changes(current: &MonitorConfig, next: &MonitorConfig) -> Vec<&'static str> {
    let (a, b) = (&current.dependency, &next.dependency);
    let checks = [
        ("dependency.name", a.name != b.name),
        ("dependency.rpc_url", a.rpc_url != b.rpc_url),
        ("dependency.failover_urls", a.failover_urls != b.failover_urls),
        ("dependency.rpc_timeout_secs", a.rpc_timeout_secs != b.rpc_timeout_secs),
        ("dependency.operation_scan_blocks", a.operation_scan_blocks != b.operation_scan_blocks),
        ("dependency.requests_per_second", a.requests_per_second != b.requests_per_second),
        ("dependency.burst", a.burst != b.burst),
        ("probes.timeout_secs", current.probes.timeout_secs != next.probes.timeout_secs),
        ("circuit_breaker", differs(&current.circuit_breaker, &next.circuit_breaker)),
        ("advisory", differs(&current.advisory, &next.advisory)),
        ("notifier.webhook_url", current.notifier.webhook_url != next.notifier.webhook_url),
        ("notifier.max_attempts", current.notifier.max_attempts != next.notifier.max_attempts),
        (
            "quarantine.persistence_path",
            current.quarantine.persistence_path != next.quarantine.persistence_path,
        ),
        ("observability", differs(&current.observability, &next.observability)),
        ("admin", differs(&current.admin, &next.admin)),
        ("extensions", current.extensions != next.extensions),
    ];
    checks
        .into_iter()
        .filter(|(_, changed)| *changed)
        .map(|(field, _)| field)
        .collect()
}

/// Load, validate and swap. Invalid files leave the current config in place.
pub fn reload_into(path: &Path, target: &SharedConfig) -> bool {
    tracing::info!("Config file change detected, reloading...");
    match load_config(path) {
        Ok(new_config) => {
            let pending = startup_only_changes(&target.load(), &new_config);
            target.store(Arc::new(new_config));
            if pending.is_empty() {
                tracing::info!(path = ?path, "Configuration reloaded");
            } else {
                tracing::warn!(
                    path = ?path,
                    restart_required = ?pending,
                    "Configuration reloaded; some changes take effect only after restart"
                );
            }
            true
        }
        Err(e) => {
            tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
            false
        }
    }
}
