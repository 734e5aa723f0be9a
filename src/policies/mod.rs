//! Retry and backoff policies.
//!
//! This module groups the knobs that control **whether** a failed worker is retried
//! and **how long** it waits between attempts.
//!
//! ## Contents
//! - [`RetryPolicy`] retry budget (`max_retries`) and the resulting [`RetryDecision`]
//! - [`BackoffPolicy`] delay schedule (base delay with one escalation step)
//! - [`JitterPolicy`]  randomization strategy to avoid reconnect storms
//!
//! ## Quick wiring
//! ```text
//! Config { max_retries, retry_delay, retry_jitter }
//!      └─► Config::retry_policy() ─► core::actor::WorkerActor uses:
//!           - retry.decide(consecutive_failures) in the Backoff state
//! ```

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::{RetryDecision, RetryPolicy};
