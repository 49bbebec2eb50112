//! Alert routing with duplicate suppression.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::SharedConfig;
use crate::notify::alert::HumanAlert;
use crate::notify::notifier::{HumanNotifier, LogNotifier, WebhookNotifier};
use crate::observability::metrics;

/// Fans alerts out to every channel, dropping repeats of the same
/// (subject, kind) inside the suppression window.
pub struct AlertRouter {
    config: SharedConfig,
    channels: Vec<Arc<dyn HumanNotifier>>,
    last_sent: Mutex<HashMap<(String, String), Instant>>,
}

impl AlertRouter {
    pub fn new(config: SharedConfig, channels: Vec<Arc<dyn HumanNotifier>>) -> Self {
        Self {
            config,
            channels,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Log channel plus the webhook when one is configured.
    pub fn from_config(config: SharedConfig) -> Self {
        let mut channels: Vec<Arc<dyn HumanNotifier>> = vec![Arc::new(LogNotifier)];
        let current = config.load_full();
        if let Some(url) = &current.notifier.webhook_url {
            match WebhookNotifier::new(url, current.notifier.max_attempts, Duration::from_secs(10)) {
                Ok(webhook) => channels.push(Arc::new(webhook)),
                Err(e) => tracing::error!(error = %e, "Failed to build webhook notifier"),
            }
        }
        Self::new(config, channels)
    }

    /// Deliver `alert` unless it duplicates a recent one. Returns whether it was sent.
    pub fn send(&self, alert: &HumanAlert) -> bool {
        let window = Duration::from_secs(self.config.load().notifier.suppression_window_secs);
        let key = (alert.subject_label().to_string(), alert.kind.clone());
        let now = Instant::now();

        {
            let mut last_sent = match self.last_sent.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            last_sent.retain(|_, at| now.duration_since(*at) < window);
            if last_sent.contains_key(&key) {
                tracing::debug!(subject = %key.0, kind = %key.1, "Suppressed duplicate alert");
                metrics::record_notification("router", "suppressed");
                return false;
            }
            last_sent.insert(key, now);
        }

        for channel in &self.channels {
            channel.notify(alert);
        }
        true
    }
}
