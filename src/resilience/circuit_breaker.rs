//! Circuit breaker for dependency isolation.
//!
//! # States
//! - Closed: normal operation, actions pass through
//! - Open: dependency assumed down, dependency-targeted actions are skipped
//! - Half-Open: testing if the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: first can_execute() after timeout since last failure
//! Half-Open → Closed: success_threshold successes
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - One breaker per named dependency, owned by a `BreakerRegistry`
//! - Transitions go through a (state × event) table; anything else is rejected
//! - Success while Closed resets the failure count (decay, not history)

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used by the state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

/// Events that move a breaker between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitEvent {
    FailureThresholdReached,
    TimeoutElapsed,
    ProbeFailed,
    SuccessThresholdReached,
}

/// The complete transition table. `None` means the event is not valid in `from`.
pub fn transition(from: CircuitState, event: CircuitEvent) -> Option<CircuitState> {
    use CircuitEvent::*;
    use CircuitState::*;

    match (from, event) {
        (Closed, FailureThresholdReached) => Some(Open),
        (Open, TimeoutElapsed) => Some(HalfOpen),
        (HalfOpen, ProbeFailed) => Some(Open),
        (HalfOpen, SuccessThresholdReached) => Some(Closed),
        _ => None,
    }
}

/// Serializable view of one breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
}

/// Circuit breaker for one dependency.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: String,
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            failure_threshold: config.failure_threshold,
            success_threshold: config.success_threshold,
            timeout: Duration::from_secs_f64(config.timeout_seconds.max(0.0)),
            last_failure: None,
            last_failure_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    /// Whether a dependency-targeted action may run now.
    ///
    /// In Open, the first call after the timeout moves to HalfOpen and returns true.
    pub fn can_execute(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .last_failure
                    .map(|at| at.elapsed() >= self.timeout)
                    .unwrap_or(true);
                if elapsed {
                    self.apply(CircuitEvent::TimeoutElapsed);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.success_threshold {
                    self.apply(CircuitEvent::SuccessThresholdReached);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&mut self) {
        self.last_failure = Some(Instant::now());
        self.last_failure_at = Some(Utc::now());

        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.failure_threshold {
                    self.apply(CircuitEvent::FailureThresholdReached);
                }
            }
            CircuitState::HalfOpen => {
                self.failure_count += 1;
                self.apply(CircuitEvent::ProbeFailed);
            }
            CircuitState::Open => {
                self.failure_count += 1;
            }
        }
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        CircuitBreakerState {
            name: self.name.clone(),
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            last_failure_time: self.last_failure_at,
        }
    }

    fn apply(&mut self, event: CircuitEvent) {
        let Some(next) = transition(self.state, event) else {
            tracing::warn!(
                breaker = %self.name,
                state = ?self.state,
                event = ?event,
                "Rejected invalid circuit transition"
            );
            return;
        };

        match next {
            CircuitState::Closed => {
                self.failure_count = 0;
                self.success_count = 0;
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                self.success_count = 0;
            }
        }

        tracing::info!(
            breaker = %self.name,
            from = ?self.state,
            to = ?next,
            "Circuit breaker transition"
        );
        self.state = next;
        metrics::record_circuit_state(&self.name, next);
    }
}

/// Named breakers shared between the control loop and status readers.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, CircuitBreaker>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Run `f` against the named breaker, creating it on first use.
    pub fn with<R>(&self, name: &str, f: impl FnOnce(&mut CircuitBreaker) -> R) -> R {
        let mut entry = self
            .breakers
            .entry(name.to_string())
            .or_insert_with(|| CircuitBreaker::new(name, &self.config));
        f(entry.value_mut())
    }

    pub fn can_execute(&self, name: &str) -> bool {
        self.with(name, |b| b.can_execute())
    }

    pub fn record_success(&self, name: &str) {
        self.with(name, |b| b.record_success())
    }

    pub fn record_failure(&self, name: &str) {
        self.with(name, |b| b.record_failure())
    }

    pub fn state(&self, name: &str) -> Option<CircuitState> {
        self.breakers.get(name).map(|b| b.state())
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn snapshot(&self) -> Vec<CircuitBreakerState> {
        let mut all: Vec<_> = self.breakers.iter().map(|b| b.snapshot()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
