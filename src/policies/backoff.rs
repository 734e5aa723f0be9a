//! # Backoff policy for restarting camera workers.
//!
//! [`BackoffPolicy`] is a bounded backoff with a single step change: the delay is
//! `base` for the first `escalate_after` consecutive failures and
//! `base × escalation_factor` from then on. It never grows geometrically, so a camera
//! that stays offline for hours is still retried on a short, predictable cadence.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use camvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     base: Duration::from_secs(5),
//!     escalate_after: 3,
//!     escalation_factor: 2,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(1), Duration::from_secs(5));
//! assert_eq!(backoff.next(3), Duration::from_secs(5));
//! assert_eq!(backoff.next(4), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay applied for the first `escalate_after` consecutive failures.
    pub base: Duration,
    /// Number of consecutive failures served with the unescalated delay.
    pub escalate_after: u32,
    /// Multiplier applied once `consecutive_failures > escalate_after`.
    pub escalation_factor: u32,
    /// Jitter applied on top of the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a policy with:
    /// - `base = 5s`;
    /// - `escalate_after = 3`;
    /// - `escalation_factor = 2`;
    /// - no jitter.
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            escalate_after: 3,
            escalation_factor: 2,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay to sleep after `consecutive_failures` failures (1-based).
    ///
    /// The unjittered value is `base` while `consecutive_failures <= escalate_after`
    /// and `base × escalation_factor` afterwards.
    pub fn next(&self, consecutive_failures: u32) -> Duration {
        let delay = if consecutive_failures > self.escalate_after {
            self.base.saturating_mul(self.escalation_factor.max(1))
        } else {
            self.base
        };
        self.jitter.apply(delay)
    }
}
