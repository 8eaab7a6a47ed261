//! Retry policy for upstream requests.

use std::time::Duration;

use crate::error::ApiError;

/// Bounded exponential backoff.
///
/// Attempt `n` (1-based) that fails transiently waits
/// `base_delay * 2^(n-1)`, capped at `max_delay`, before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether `error` may be retried by this policy.
    pub fn is_retryable(&self, error: &ApiError) -> bool {
        matches!(
            error,
            ApiError::Network(_) | ApiError::Timeout(_) | ApiError::Server { .. }
        )
    }

    /// Whether another attempt is allowed after `attempt` failed.
    pub fn allows_another(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
