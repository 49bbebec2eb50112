//! Alert delivery channels.

use std::time::Duration;

use crate::notify::alert::HumanAlert;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

/// Fire-and-forget delivery of an alert to a human.
///
/// Implementations must not block the caller on network I/O.
pub trait HumanNotifier: Send + Sync {
    fn channel(&self) -> &'static str;

    fn notify(&self, alert: &HumanAlert);
}

/// Writes alerts to the log. Always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl HumanNotifier for LogNotifier {
    fn channel(&self) -> &'static str {
        "log"
    }

    fn notify(&self, alert: &HumanAlert) {
        tracing::error!(
            subject = %alert.subject_label(),
            kind = %alert.kind,
            severity = alert.severity.as_str(),
            incident_id = alert.incident_id.as_deref().unwrap_or("-"),
            title = %alert.title,
            "{}",
            alert.message
        );
        metrics::record_notification("log", "sent");
    }
}

/// POSTs alerts as JSON, retrying with jittered backoff in a background task.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    policy: RetryPolicy,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, max_attempts: u32, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            policy: RetryPolicy::new(max_attempts),
        })
    }

    /// Deliver one alert, retrying transport errors and non-2xx answers.
    pub async fn deliver(&self, alert: &HumanAlert) -> Result<(), reqwest::Error> {
        let client = &self.client;
        let url = self.url.as_str();
        self.policy
            .run(
                move |_attempt| async move {
                    client
                        .post(url)
                        .json(alert)
                        .send()
                        .await?
                        .error_for_status()
                        .map(|_| ())
                },
                |_e: &reqwest::Error| true,
            )
            .await
    }
}

impl HumanNotifier for WebhookNotifier {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    fn notify(&self, alert: &HumanAlert) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(url = %self.url, "No runtime available, webhook alert dropped");
            metrics::record_notification("webhook", "dropped");
            return;
        };

        let notifier = self.clone();
        let alert = alert.clone();
        handle.spawn(async move {
            match notifier.deliver(&alert).await {
                Ok(()) => {
                    tracing::debug!(url = %notifier.url, kind = %alert.kind, "Webhook alert delivered");
                    metrics::record_notification("webhook", "sent");
                }
                Err(e) => {
                    tracing::error!(url = %notifier.url, error = %e, "Webhook alert delivery failed");
                    metrics::record_notification("webhook", "failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::incident::Severity;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/hook", addr)
    }

    fn alert() -> HumanAlert {
        HumanAlert::new(Some("svc-A".into()), "process_crash", Severity::Critical, "down", "svc-A down")
    }

    #[tokio::test]
    async fn test_webhook_posts_json() {
        let received = Arc::new(AtomicU32::new(0));
        let counter = received.clone();
        let router = Router::new().route(
            "/hook",
            post(move |Json(body): Json<serde_json::Value>| {
                let counter = counter.clone();
                async move {
                    assert_eq!(body["kind"], "process_crash");
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::OK
                }
            }),
        );
        let url = serve(router).await;

        let notifier = WebhookNotifier::new(url, 3, Duration::from_secs(5)).unwrap();
        notifier.deliver(&alert()).await.unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_webhook_retries_server_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/hook",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }),
        );
        let url = serve(router).await;

        let notifier = WebhookNotifier {
            policy: RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
            ..WebhookNotifier::new(url, 2, Duration::from_secs(5)).unwrap()
        };
        assert!(notifier.deliver(&alert()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
