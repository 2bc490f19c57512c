//! Execution strategy: retry with exponential backoff for transient failures
//!
//! The delay before retry `n` is `base_delay * 2^n`, capped at `max_delay`.
//! Only errors whose [`TransientError::is_transient`](super::TransientError)
//! is true are retried.

use std::time::Duration;

/// Retry policy applied by [`execute_in_transaction`](super::execute_in_transaction)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionStrategy {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ExecutionStrategy {
    /// Never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay for the retry following failed attempt `attempt` (0-based)
    ///
    /// Doubles per attempt, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` failed
    pub fn should_retry(&self, attempt: u32, transient: bool) -> bool {
        transient && attempt < self.max_retries
    }
}
