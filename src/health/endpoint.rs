//! HTTP health endpoint probe.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use hyper::{header, Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time::{self, Instant};

use crate::health::probe::EndpointProbe;
use crate::health::types::{EndpointCheck, ProbeError};

pub struct HttpEndpointProbe {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl HttpEndpointProbe {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }
}

#[async_trait]
impl EndpointProbe for HttpEndpointProbe {
    async fn check_endpoint(&self, url: &str) -> Result<EndpointCheck, ProbeError> {
        let uri: Uri = url
            .parse()
            .map_err(|e| ProbeError::Failed(format!("invalid health endpoint '{}': {}", url, e)))?;
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::USER_AGENT, "agent-medic-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::Failed(format!("invalid health request: {}", e)))?;

        let start = Instant::now();
        let response = match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(url = %url, error = %e, "Health check failed: connection error");
                return Err(ProbeError::Failed(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(url = %url, "Health check failed: timeout");
                return Err(ProbeError::Timeout(self.timeout));
            }
        };
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = %status, "Health check failed: non-success status");
        }

        Ok(EndpointCheck {
            healthy: status.is_success(),
            status_code: Some(status.as_u16()),
            latency_ms,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_2xx_is_healthy() {
        let base = serve(Router::new().route("/health", get(|| async { "ok" }))).await;
        let check = HttpEndpointProbe::new(Duration::from_secs(5))
            .check_endpoint(&format!("{}/health", base))
            .await
            .unwrap();
        assert!(check.healthy);
        assert_eq!(check.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_non_2xx_is_answered_but_unhealthy() {
        let base = serve(Router::new().route(
            "/health",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        ))
        .await;
        let check = HttpEndpointProbe::new(Duration::from_secs(5))
            .check_endpoint(&format!("{}/health", base))
            .await
            .unwrap();
        assert!(!check.healthy);
        assert_eq!(check.status_code, Some(503));
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let base = serve(Router::new().route(
            "/health",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;
        let err = HttpEndpointProbe::new(Duration::from_millis(100))
            .check_endpoint(&format!("{}/health", base))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_unparseable_url_is_a_probe_failure() {
        let err = HttpEndpointProbe::new(Duration::from_secs(1))
            .check_endpoint("http://bad host/health")
            .await
            .unwrap_err();
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("invalid health endpoint"));
    }
}
