//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check agent identity and probe coverage
//! - Validate value ranges (timeouts > 0, ratios in range, URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MonitorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, including on reload

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::MonitorConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &MonitorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for (i, agent) in config.agents.iter().enumerate() {
        let field = format!("agents[{}]", i);
        if agent.name.trim().is_empty() {
            errors.push(ValidationError::new(&field, "name must not be empty"));
        } else if !seen.insert(agent.name.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate agent name '{}'", agent.name),
            ));
        }

        if agent.process_name.is_none()
            && agent.health_endpoint.is_none()
            && agent.operator_address.is_none()
        {
            errors.push(ValidationError::new(
                &field,
                "at least one of process_name, health_endpoint, operator_address is required",
            ));
        }

        // Health probes use a plain HTTP connector.
        if let Some(endpoint) = &agent.health_endpoint {
            let field = format!("{}.health_endpoint", field);
            match Url::parse(endpoint) {
                Ok(url) if url.scheme() == "http" => {}
                Ok(url) => errors.push(ValidationError::new(
                    field,
                    format!("unsupported scheme '{}'", url.scheme()),
                )),
                Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
            }
        }
    }

    check_http_url(&mut errors, "dependency.rpc_url", &config.dependency.rpc_url);
    for (i, url) in config.dependency.failover_urls.iter().enumerate() {
        check_http_url(&mut errors, &format!("dependency.failover_urls[{}]", i), url);
    }
    if config.dependency.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("dependency.rpc_timeout_secs", "must be > 0"));
    }
    if config.dependency.block_time_ms == 0 {
        errors.push(ValidationError::new("dependency.block_time_ms", "must be > 0"));
    }
    if config.dependency.requests_per_second <= 0.0 || config.dependency.burst < 1.0 {
        errors.push(ValidationError::new(
            "dependency.requests_per_second",
            "rate must be > 0 and burst >= 1",
        ));
    }

    if config.probes.timeout_secs == 0 {
        errors.push(ValidationError::new("probes.timeout_secs", "must be > 0"));
    }

    let cb = &config.circuit_breaker;
    if cb.failure_threshold == 0 || cb.success_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker", "thresholds must be > 0"));
    }
    if cb.timeout_seconds < 0.0 {
        errors.push(ValidationError::new("circuit_breaker.timeout_seconds", "must be >= 0"));
    }

    let s = &config.scheduler;
    for (name, value) in [
        ("scheduler.default_interval_secs", s.default_interval_secs),
        ("scheduler.incident_interval_secs", s.incident_interval_secs),
        ("scheduler.stable_interval_secs", s.stable_interval_secs),
        ("scheduler.tier0_tick_secs", s.tier0_tick_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(name, "must be > 0"));
        }
    }
    if !(s.stall_ratio > 0.0 && s.stall_ratio <= 1.0) {
        errors.push(ValidationError::new("scheduler.stall_ratio", "must be in (0, 1]"));
    }
    if !(0.0..=100.0).contains(&s.max_memory_percent) {
        errors.push(ValidationError::new(
            "scheduler.max_memory_percent",
            "must be between 0 and 100",
        ));
    }

    if let Some(url) = &config.advisory.url {
        check_http_url(&mut errors, "advisory.url", url);
    }
    if let Some(url) = &config.notifier.webhook_url {
        check_http_url(&mut errors, "notifier.webhook_url", url);
    }
    if config.notifier.max_attempts == 0 {
        errors.push(ValidationError::new("notifier.max_attempts", "must be > 0"));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must be set when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}
