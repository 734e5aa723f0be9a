//! # Jitter policy for retry delays.
//!
//! Cameras dropped by one switch outage all fail within the same poll tick. Jitter
//! spreads their reconnects so they do not hit the gateway together.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Randomization applied on top of the backoff delay.
///
/// | policy  | resulting delay                  |
/// |---------|----------------------------------|
/// | `none`  | exactly the backoff delay        |
/// | `full`  | uniform in `[0, delay]`          |
/// | `equal` | `delay/2` plus uniform `[0, delay/2]` |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterPolicy {
    #[default]
    None,
    Full,
    Equal,
}

impl JitterPolicy {
    /// Returns `delay` with this policy's randomization applied.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let floor = match self {
            JitterPolicy::None => return delay,
            JitterPolicy::Full => 0,
            JitterPolicy::Equal => ms / 2,
        };
        let span = ms - floor;
        if span == 0 {
            return Duration::from_millis(floor);
        }
        Duration::from_millis(floor + rand::rng().random_range(0..=span))
    }
}
