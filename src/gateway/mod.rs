//! # Streaming-gateway health.
//!
//! The gateway republishes live feeds; recording does not depend on it. Its health
//! is polled over HTTP and cached by [`DependencyHealthMonitor`] so that status
//! reporting never waits on the network more than once per interval.

mod monitor;
mod probe;

pub use monitor::DependencyHealthMonitor;
pub use probe::{HealthProbe, HttpProbe};
