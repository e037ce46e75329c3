//! Retry, backoff and escalation rules for provider calls

use crate::error::ErrorClass;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try the same provider again after the delay
    Retry(Duration),
    /// Give up on this provider; the next one in the chain may be tried
    Escalate,
    /// Give up on the whole chain
    Stop,
}

/// Failures seen so far on one provider, including the latest one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptHistory {
    pub attempts: u32,
    pub rate_limited: u32,
    pub transient: u32,
}

impl AttemptHistory {
    pub fn record(&mut self, class: ErrorClass) {
        self.attempts += 1;
        match class {
            ErrorClass::RateLimited => self.rate_limited += 1,
            ErrorClass::Timeout | ErrorClass::TransientNetwork => self.transient += 1,
            ErrorClass::Unrecoverable => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts on one provider while it keeps answering "rate limited"
    pub max_rate_limit_attempts: u32,
    /// Extra attempts after a timeout or transient network error
    pub transient_retries: u32,
    /// First rate-limit backoff
    pub base_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// Cap on any single backoff, including provider retry-after hints
    pub max_backoff_ms: u64,
    /// Pause before retrying a timeout or transient failure
    pub transient_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_attempts: 3,
            transient_retries: 1,
            base_backoff_ms: 1000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 30_000,
            transient_backoff_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Backoff before rate-limit retry number `retry` (0-indexed)
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(retry as i32);
        let delay = self.base_backoff_ms as f64 * multiplier;
        let capped = delay.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Hard ceiling on attempts against one provider across all classes
    pub fn max_attempts_per_provider(&self) -> u32 {
        self.max_rate_limit_attempts
            .max(self.transient_retries + 1)
            .max(1)
    }

    pub fn decide(&self, class: ErrorClass, history: &AttemptHistory) -> RetryDecision {
        if class == ErrorClass::Unrecoverable {
            return RetryDecision::Stop;
        }
        if history.attempts >= self.max_attempts_per_provider() {
            return RetryDecision::Escalate;
        }

        match class {
            ErrorClass::RateLimited if history.rate_limited < self.max_rate_limit_attempts => {
                RetryDecision::Retry(self.backoff_delay(history.rate_limited.saturating_sub(1)))
            }
            ErrorClass::Timeout | ErrorClass::TransientNetwork
                if history.transient <= self.transient_retries =>
            {
                RetryDecision::Retry(Duration::from_millis(self.transient_backoff_ms))
            }
            _ => RetryDecision::Escalate,
        }
    }

    /// Rate-limit delay honouring a provider's retry-after hint, capped
    pub fn rate_limit_delay(&self, computed: Duration, retry_after_secs: Option<u64>) -> Duration {
        let hinted = retry_after_secs
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO);
        computed
            .max(hinted)
            .min(Duration::from_millis(self.max_backoff_ms))
    }
}
