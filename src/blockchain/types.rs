//! Dependency health types, error definitions and the probe/control seams.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::health::types::{OperationFailure, ProbeError};

/// Dependency health as seen by one probe call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyHealth {
    /// Endpoint that answered (or failed to).
    pub endpoint: String,
    pub healthy: bool,
    /// Chain position (latest block number) when reachable.
    pub position: Option<u64>,
    pub latency_ms: f64,
    /// Raw error text; classified into rate-limited vs unavailable.
    pub error: Option<String>,
}

impl DependencyHealth {
    pub fn healthy(endpoint: impl Into<String>, position: u64, latency_ms: f64) -> Self {
        Self {
            endpoint: endpoint.into(),
            healthy: true,
            position: Some(position),
            latency_ms,
            error: None,
        }
    }

    pub fn unhealthy(endpoint: impl Into<String>, latency_ms: f64, error: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            healthy: false,
            position: None,
            latency_ms,
            error: Some(error.into()),
        }
    }
}

/// How a dependency failure is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyErrorKind {
    RateLimited,
    Unavailable,
}

impl DependencyErrorKind {
    /// Rate-limit signature: an HTTP 429 or any mention of "rate".
    pub fn classify(error_text: &str) -> Self {
        if error_text.contains("429") || error_text.to_ascii_lowercase().contains("rate") {
            DependencyErrorKind::RateLimited
        } else {
            DependencyErrorKind::Unavailable
        }
    }
}

/// Errors that can occur talking to the dependency.
#[derive(Debug, Clone, Error)]
pub enum DependencyError {
    #[error("Dependency rate limited: {0}")]
    RateLimited(String),

    #[error("Dependency unavailable: {0}")]
    Unavailable(String),

    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    #[error("No alternate endpoint configured")]
    NoAlternateEndpoint,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl DependencyError {
    /// Build the classified error variant from raw error text.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        match DependencyErrorKind::classify(&text) {
            DependencyErrorKind::RateLimited => DependencyError::RateLimited(text),
            DependencyErrorKind::Unavailable => DependencyError::Unavailable(text),
        }
    }
}

/// Result type for dependency operations.
pub type DependencyResult<T> = Result<T, DependencyError>;

/// Read side of the dependency.
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    /// Endpoint currently being queried.
    fn current_endpoint(&self) -> String;

    /// Query the active endpoint once. Failures are captured, never returned.
    async fn dependency_health(&self) -> DependencyHealth;

    /// Recent failed operations sent by `address`, at most `limit`.
    async fn recent_operation_failures(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<OperationFailure>, ProbeError>;
}

/// Remediation side of the dependency.
#[async_trait]
pub trait DependencyControl: Send + Sync {
    /// Rotate to the next configured endpoint; returns the new endpoint.
    async fn switch_endpoint(&self) -> DependencyResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit_signatures() {
        assert_eq!(
            DependencyErrorKind::classify("HTTP error 429 Too Many Requests"),
            DependencyErrorKind::RateLimited
        );
        assert_eq!(
            DependencyErrorKind::classify("Rate limit exceeded"),
            DependencyErrorKind::RateLimited
        );
        assert_eq!(
            DependencyErrorKind::classify("connection refused"),
            DependencyErrorKind::Unavailable
        );
    }

    #[test]
    fn test_error_display() {
        let err = DependencyError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");
        assert!(matches!(
            DependencyError::from_text("429"),
            DependencyError::RateLimited(_)
        ));
    }
}
