//! # Retry budget for camera workers.
//!
//! [`RetryPolicy`] decides what happens after a counted failure (launch failure or
//! unexpected exit): either sleep and try again, or give up and mark the worker
//! `Failed`. Resource and space exhaustion never reach this policy.
//!
//! ```text
//! consecutive_failures ──► decide()
//!                            ├─ >= max_retries ─► GiveUp        (Backoff → Failed)
//!                            └─ otherwise      ─► Retry{delay}  (Backoff → Starting)
//! ```

use std::time::Duration;

use crate::policies::backoff::BackoffPolicy;

/// Outcome of a retry decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then return to `Starting`.
    Retry {
        /// Backoff delay before the next admission check.
        delay: Duration,
    },
    /// Retry budget exhausted; the worker becomes `Failed`.
    GiveUp,
}

/// Bounded retry policy for one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive counted failures tolerated before giving up.
    pub max_retries: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryPolicy {
    /// Decides the next step after `consecutive_failures` counted failures.
    pub fn decide(&self, consecutive_failures: u32) -> RetryDecision {
        if self.is_exhausted(consecutive_failures) {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry {
                delay: self.backoff.next(consecutive_failures),
            }
        }
    }

    /// Returns `true` once the budget is spent.
    #[inline]
    pub fn is_exhausted(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gives_up_exactly_at_max_retries() {
        let p = RetryPolicy {
            max_retries: 3,
            ..RetryPolicy::default()
        };
        assert!(matches!(p.decide(2), RetryDecision::Retry { .. }));
        assert_eq!(p.decide(3), RetryDecision::GiveUp);
        assert_eq!(p.decide(4), RetryDecision::GiveUp);
    }

    #[test]
    fn test_retry_carries_backoff_delay() {
        let p = RetryPolicy::default();
        assert_eq!(
            p.decide(1),
            RetryDecision::Retry {
                delay: Duration::from_secs(5)
            }
        );
        assert_eq!(
            p.decide(4),
            RetryDecision::Retry {
                delay: Duration::from_secs(10)
            }
        );
    }
}
