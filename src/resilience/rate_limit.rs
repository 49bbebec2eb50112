//! Rate limiting primitives.
//!
//! - `TokenBucket` throttles outgoing dependency RPC calls (callers wait).
//! - `WindowLimiter` spaces out expensive tier calls (callers inside the window are skipped).

use std::time::Duration;

use tokio::time::Instant;

/// A simple token bucket rate limiter.
#[derive(Debug)]
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_update: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_update: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_update = now;
    }

    pub fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one token is available; zero if one is available now.
    pub fn time_until_available(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 || self.refill_rate <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
        }
    }
}

/// Allows at most one call per window. Calls inside the window are refused, not queued.
#[derive(Debug)]
pub struct WindowLimiter {
    window: Duration,
    last: Option<Instant>,
}

impl WindowLimiter {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Claim the window if it has elapsed since the last claim.
    pub fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Time left in the current window.
    pub fn remaining(&self) -> Duration {
        self.last
            .map(|last| self.window.saturating_sub(last.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }
}
