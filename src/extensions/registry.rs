use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SharedConfig;

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Extension '{0}' is already registered")]
    Duplicate(String),

    #[error("Unknown extension '{0}'")]
    Unknown(String),

    #[error("Extension '{name}' failed to initialize: {reason}")]
    Init { name: String, reason: String },
}

/// What an extension may use while starting.
#[derive(Clone)]
pub struct ExtensionContext {
    pub config: SharedConfig,
    /// Config file on disk, when the process was started from one.
    pub config_path: Option<PathBuf>,
}

#[async_trait]
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&mut self, ctx: &ExtensionContext) -> Result<(), ExtensionError>;

    async fn shutdown(&mut self);
}

pub type ExtensionFactory = Box<dyn Fn() -> Box<dyn Extension> + Send + Sync>;

/// Name → factory map, filled once at startup.
#[derive(Default)]
pub struct ExtensionRegistry {
    factories: BTreeMap<String, ExtensionFactory>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `prometheus` and `config-watcher`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, ExtensionFactory); 2] = [
            (
                "prometheus",
                Box::new(|| -> Box<dyn Extension> {
                    Box::new(super::builtin::PrometheusExtension::default())
                }),
            ),
            (
                "config-watcher",
                Box::new(|| -> Box<dyn Extension> {
                    Box::new(super::builtin::ConfigWatcherExtension::default())
                }),
            ),
        ];
        for (name, factory) in builtins {
            // Names are distinct literals, so registration cannot collide.
            let _ = registry.register(name, factory);
        }
        registry
    }

    pub fn register(&mut self, name: &str, factory: ExtensionFactory) -> Result<(), ExtensionError> {
        if self.factories.contains_key(name) {
            return Err(ExtensionError::Duplicate(name.to_string()));
        }
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build and initialize `names` in order.
    ///
    /// Every name is resolved before anything starts. If one fails to
    /// initialize, the ones already started are shut down again.
    pub async fn start(
        &self,
        names: &[String],
        ctx: &ExtensionContext,
    ) -> Result<RunningExtensions, ExtensionError> {
        let factories = names
            .iter()
            .map(|name| {
                self.factories
                    .get(name)
                    .ok_or_else(|| ExtensionError::Unknown(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut running = RunningExtensions::default();
        for factory in factories {
            let mut extension = factory();
            if let Err(e) = extension.initialize(ctx).await {
                running.shutdown().await;
                return Err(e);
            }
            tracing::info!(extension = extension.name(), "Extension initialized");
            running.started.push(extension);
        }
        Ok(running)
    }
}

/// Started extensions, in start order.
#[derive(Default)]
pub struct RunningExtensions {
    started: Vec<Box<dyn Extension>>,
}

impl RunningExtensions {
    pub fn names(&self) -> Vec<String> {
        self.started.iter().map(|e| e.name().to_string()).collect()
    }

    /// Shut everything down in reverse start order.
    pub async fn shutdown(&mut self) {
        while let Some(mut extension) = self.started.pop() {
            extension.shutdown().await;
            tracing::info!(extension = extension.name(), "Extension shut down");
        }
    }
}
