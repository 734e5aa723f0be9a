//! # Cached gateway health.
//!
//! ```text
//! is_healthy()
//!   ├─ interval not elapsed → cached value
//!   └─ elapsed (or never checked) → probe → update state, log transition
//! force_check() → probe now
//! ```
//!
//! Status strings: `Online`, `Down (N failures)`, `Unknown` (never succeeded, never failed).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::HealthProbe;

#[derive(Default)]
struct HealthState {
    last_check: Option<Instant>,
    healthy: bool,
    consecutive_failures: u32,
}

/// Caching health monitor for one dependency.
pub struct DependencyHealthMonitor {
    probe: Arc<dyn HealthProbe>,
    interval: Duration,
    state: Mutex<HealthState>,
    probing: tokio::sync::Mutex<()>,
}

impl DependencyHealthMonitor {
    pub fn new(probe: Arc<dyn HealthProbe>, interval: Duration) -> Self {
        Self {
            probe,
            interval,
            state: Mutex::new(HealthState::default()),
            probing: tokio::sync::Mutex::new(()),
        }
    }

    /// Cached health; probes only when the interval has elapsed. The first call always probes.
    pub async fn is_healthy(&self) -> bool {
        let _probing = self.probing.lock().await;
        if !self.is_due() {
            return self.state.lock().healthy;
        }
        self.check().await
    }

    /// Probes immediately, bypassing the cache.
    pub async fn force_check(&self) -> bool {
        let _probing = self.probing.lock().await;
        self.check().await
    }

    /// `Online`, `Down (N failures)` or `Unknown`.
    pub fn status(&self) -> String {
        let state = self.state.lock();
        if state.healthy {
            "Online".to_string()
        } else if state.consecutive_failures > 0 {
            format!("Down ({} failures)", state.consecutive_failures)
        } else {
            "Unknown".to_string()
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    fn is_due(&self) -> bool {
        match self.state.lock().last_check {
            Some(at) => at.elapsed() >= self.interval,
            None => true,
        }
    }

    async fn check(&self) -> bool {
        let result = self.probe.probe().await;

        let mut state = self.state.lock();
        state.last_check = Some(Instant::now());
        match result {
            Ok(()) => {
                if state.consecutive_failures > 0 {
                    info!(
                        after_failures = state.consecutive_failures,
                        "gateway recovered"
                    );
                } else if !state.healthy {
                    info!("gateway is healthy and responding");
                }
                state.healthy = true;
                state.consecutive_failures = 0;
            }
            Err(err) => {
                state.consecutive_failures += 1;
                if state.healthy {
                    error!(error = %err, "gateway is down, live streaming unavailable");
                } else {
                    warn!(
                        failures = state.consecutive_failures,
                        error = %err,
                        "gateway still down"
                    );
                }
                state.healthy = false;
            }
        }
        state.healthy
    }
}
