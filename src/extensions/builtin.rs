//! Built-in extensions.

use std::net::SocketAddr;

use async_trait::async_trait;
use notify::RecommendedWatcher;

use crate::config::watcher::ConfigWatcher;
use crate::extensions::registry::{Extension, ExtensionContext, ExtensionError};
use crate::observability::metrics;

/// Installs the Prometheus recorder and scrape endpoint.
#[derive(Debug, Default)]
pub struct PrometheusExtension {
    address: Option<SocketAddr>,
}

#[async_trait]
impl Extension for PrometheusExtension {
    fn name(&self) -> &str {
        "prometheus"
    }

    async fn initialize(&mut self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        let configured = ctx.config.load().observability.metrics_address.clone();
        let init_error = |reason: String| ExtensionError::Init {
            name: "prometheus".to_string(),
            reason,
        };
        let addr: SocketAddr = configured
            .parse()
            .map_err(|e| init_error(format!("invalid metrics address '{}': {}", configured, e)))?;
        metrics::init_metrics(addr).map_err(|e| init_error(e.to_string()))?;
        self.address = Some(addr);
        Ok(())
    }

    async fn shutdown(&mut self) {
        // The global recorder lives for the rest of the process.
        if let Some(addr) = self.address.take() {
            tracing::debug!(address = %addr, "Prometheus exporter left running until exit");
        }
    }
}

/// Reloads the config file on change.
#[derive(Default)]
pub struct ConfigWatcherExtension {
    watcher: Option<RecommendedWatcher>,
}

#[async_trait]
impl Extension for ConfigWatcherExtension {
    fn name(&self) -> &str {
        "config-watcher"
    }

    async fn initialize(&mut self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        let Some(path) = &ctx.config_path else {
            tracing::warn!("No config file in use, config-watcher has nothing to watch");
            return Ok(());
        };
        let watcher = ConfigWatcher::new(path, ctx.config.clone())
            .run()
            .map_err(|e| ExtensionError::Init {
                name: "config-watcher".to_string(),
                reason: e.to_string(),
            })?;
        self.watcher = Some(watcher);
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.watcher = None;
    }
}
