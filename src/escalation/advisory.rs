//! Tier1: cheap external advisory.
//!
//! The advisory service receives a compact health summary and answers with a
//! verdict. It is assumed unreliable: any failure to get an answer becomes a
//! verdict with `escalate = true`. A reply that arrives but cannot be parsed is
//! treated as a warning to keep monitoring.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AdvisoryConfig;
use crate::escalation::tier0::{HostSample, Tier0Report};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorySeverity {
    Ok,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryAction {
    None,
    Monitor,
    AlertHuman,
    Escalate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryVerdict {
    pub severity: AdvisorySeverity,
    pub summary: String,
    pub action: AdvisoryAction,
    pub escalate: bool,
    #[serde(default)]
    pub reason: String,
}

impl AdvisoryVerdict {
    /// Verdict used when the advisory could not answer.
    pub fn fail_safe(error: &AdvisoryError) -> Self {
        match error {
            AdvisoryError::Malformed(detail) => Self {
                severity: AdvisorySeverity::Warning,
                summary: "Could not parse advisory response".to_string(),
                action: AdvisoryAction::Monitor,
                escalate: false,
                reason: detail.chars().take(100).collect(),
            },
            other => Self {
                severity: AdvisorySeverity::Warning,
                summary: "Advisory unavailable, defaulting to safe mode".to_string(),
                action: AdvisoryAction::Escalate,
                escalate: true,
                reason: other.to_string(),
            },
        }
    }

    /// Whether this verdict asks for a full cycle.
    pub fn wants_cycle(&self) -> bool {
        self.escalate || self.action == AdvisoryAction::Escalate
    }
}

/// Summary sent to the advisory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub timestamp: DateTime<Utc>,
    pub reasons: Vec<String>,
    pub consecutive_failures: u32,
    pub host: Option<HostSample>,
    pub dependency_position: Option<u64>,
}

impl From<&Tier0Report> for AdvisoryRequest {
    fn from(report: &Tier0Report) -> Self {
        Self {
            timestamp: Utc::now(),
            reasons: report.reasons.clone(),
            consecutive_failures: report.consecutive_failures,
            host: report.host,
            dependency_position: report.dependency_position,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AdvisoryError {
    #[error("Advisory service not configured")]
    Disabled,

    #[error("Advisory transport error: {0}")]
    Transport(String),

    #[error("Advisory returned HTTP {0}")]
    Status(u16),

    #[error("Advisory timed out")]
    Timeout,

    #[error("Malformed advisory response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait Advisory: Send + Sync {
    async fn assess(&self, request: &AdvisoryRequest) -> Result<AdvisoryVerdict, AdvisoryError>;
}

/// Ask the advisory, converting any failure into its fail-safe verdict.
pub async fn consult(advisory: &dyn Advisory, request: &AdvisoryRequest) -> AdvisoryVerdict {
    match advisory.assess(request).await {
        Ok(verdict) => {
            metrics::record_tier_call("tier1", "answered");
            tracing::info!(
                severity = ?verdict.severity,
                action = ?verdict.action,
                escalate = verdict.escalate,
                summary = %verdict.summary,
                "Tier1 verdict"
            );
            verdict
        }
        Err(e) => {
            metrics::record_tier_call("tier1", "failed");
            let verdict = AdvisoryVerdict::fail_safe(&e);
            tracing::warn!(error = %e, escalate = verdict.escalate, "Tier1 advisory failed");
            verdict
        }
    }
}

/// Advisory reached over HTTP: POST the request as JSON, expect a verdict back.
#[derive(Debug, Clone)]
pub struct HttpAdvisory {
    client: reqwest::Client,
    url: Option<String>,
    api_key: Option<String>,
}

impl HttpAdvisory {
    pub fn from_config(config: &AdvisoryConfig) -> Result<Self, AdvisoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdvisoryError::Transport(e.to_string()))?;
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Advisory for HttpAdvisory {
    async fn assess(&self, request: &AdvisoryRequest) -> Result<AdvisoryVerdict, AdvisoryError> {
        let url = self.url.as_deref().ok_or(AdvisoryError::Disabled)?;

        let mut builder = self.client.post(url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AdvisoryError::Timeout
            } else {
                AdvisoryError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdvisoryError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AdvisoryError::Timeout
            } else {
                AdvisoryError::Transport(e.to_string())
            }
        })?;
        serde_json::from_str(&body).map_err(|_| AdvisoryError::Malformed(body))
    }
}
