//! Bounded exponential backoff for transient collaborator failures
//!
//! Only transient errors (reasoning call, research call, persistence) are
//! retried; tool-logic failures are surfaced to the collaborator instead.

use std::time::Duration;

/// Retry policy: attempt count plus doubling backoff with a ceiling
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Backoff before the given retry (1-indexed: first retry waits the
    /// initial backoff, each later retry doubles, capped at the ceiling).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(20);
        let backoff = self.initial_backoff.saturating_mul(1u32 << exp);
        backoff.min(self.max_backoff)
    }

    /// Whether another attempt is allowed after `attempts` tries
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5)
            .with_backoff(Duration::from_secs(2), Duration::from_secs(10));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(8));
        assert_eq!(policy.backoff_for(4), Duration::from_secs(10));
        assert_eq!(policy.backoff_for(12), Duration::from_secs(10));
    }

    #[test]
    fn test_allows_retry_is_bounded() {
        let policy = RetryPolicy::new(3);
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
        assert!(!policy.allows_retry(10));
    }
}
