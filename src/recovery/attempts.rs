//! Rolling-window restart counter.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

/// Per-subject restart attempts, pruned to the window on every read.
#[derive(Debug, Default)]
pub struct RestartLedger {
    attempts: HashMap<String, VecDeque<Instant>>,
}

impl RestartLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts for `subject` inside the last `window`.
    pub fn count(&mut self, subject: &str, window: Duration) -> u32 {
        let Some(attempts) = self.attempts.get_mut(subject) else {
            return 0;
        };
        let now = Instant::now();
        while attempts
            .front()
            .is_some_and(|t| now.duration_since(*t) >= window)
        {
            attempts.pop_front();
        }
        attempts.len() as u32
    }

    pub fn record(&mut self, subject: &str) {
        self.attempts
            .entry(subject.to_string())
            .or_default()
            .push_back(Instant::now());
    }
}
