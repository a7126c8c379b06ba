//! Explicit retry policy for transient LLM failures

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry with exponential backoff
///
/// A policy is pure data: it caps total attempts and computes the delay
/// before each retry, so tests can assert the schedule without sleeping.
/// Which errors are worth retrying is decided by
/// [`crate::LlmError::is_retryable`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1)
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds; doubles each retry
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(1, 0)
    }

    /// Delay to wait after the given failed attempt (1-based)
    ///
    /// Exponential: base, 2×base, 4×base, ...
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Whether another attempt is allowed after `attempt` failures
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    /// Three attempts, starting at 500ms backoff
    fn default() -> Self {
        Self::new(3, 500)
    }
}
