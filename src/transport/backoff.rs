//! Exponential backoff state machine used by the connection worker.

use std::time::Duration;

use super::config::RetryPolicy;

/// Tracks reconnection attempts and the current inter-attempt delay.
///
/// `current_retries` counts failures since the last success or the last
/// doubling; `total_retries` counts failures since the last success.
#[derive(Clone, Debug)]
pub struct BackoffState {
    policy: RetryPolicy,
    delay: Duration,
    current_retries: u32,
    total_retries: u32,
}

impl BackoffState {
    /// Create a new state machine from the supplied policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            delay: policy.connection_delay,
            current_retries: 0,
            total_retries: 0,
            policy,
        }
    }

    /// Record a failed attempt and return how long to wait before the next.
    ///
    /// The delay doubles once `attempts_before_decay` failures accumulate at
    /// the current delay, provided the delay is still below the maximum. The
    /// doubled value is not clamped, so the delay may overshoot the maximum by
    /// one step; no doubling happens after that.
    pub fn record_failure(&mut self) -> Duration {
        self.total_retries = self.total_retries.saturating_add(1);
        self.current_retries = self.current_retries.saturating_add(1);
        if self.delay < self.policy.max_delay_between_reconnection
            && self.current_retries >= self.policy.attempts_before_decay
        {
            self.delay = self.delay.saturating_mul(2);
            self.current_retries = 0;
        }
        self.delay
    }

    /// Reset counters and delay after a successful connection.
    pub fn record_success(&mut self) {
        self.current_retries = 0;
        self.total_retries = 0;
        self.delay = self.policy.connection_delay;
    }

    /// Whether enough consecutive failures occurred to stop buffering.
    pub fn exhausted(&self) -> bool {
        self.total_retries >= self.policy.maximum_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn current_retries(&self) -> u32 {
        self.current_retries
    }

    pub fn total_retries(&self) -> u32 {
        self.total_retries
    }
}
