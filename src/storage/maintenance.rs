//! # Maintenance task: the retention engine on its own schedule.
//!
//! ```text
//! preflight()             once, before any worker starts
//!   └─ below floor? → emergency_eviction(floor + startup headroom)
//!                       └─ still below floor → RuntimeError::InsufficientSpace
//!
//! run(token)              until cancelled
//!   loop {
//!     select! { cancelled → exit | interval elapsed | space pressure signalled }
//!     run_pass():
//!       log_storage_info → scheduled_cleanup → !has_enough_space?
//!                                               └─ emergency_eviction(floor + headroom)
//!   }
//! ```
//!
//! Filesystem work runs on the blocking pool; the async side only schedules and
//! publishes [`Event`]s.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::retention::{CleanupReport, EvictionReport, RetentionEngine};
use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};

/// What one maintenance pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    pub cleanup: CleanupReport,
    /// Set when free space was still below the floor after cleanup.
    pub eviction: Option<EvictionReport>,
}

/// Periodic retention driver.
pub struct Maintenance {
    engine: Arc<RetentionEngine>,
    bus: Bus,
    interval: Duration,
    emergency_headroom_gb: u64,
    startup_headroom_gb: u64,
    pressure: Arc<Notify>,
}

impl Maintenance {
    pub fn new(
        engine: Arc<RetentionEngine>,
        bus: Bus,
        interval: Duration,
        emergency_headroom_gb: u64,
        startup_headroom_gb: u64,
    ) -> Self {
        Self {
            engine,
            bus,
            interval,
            emergency_headroom_gb,
            startup_headroom_gb,
            pressure: Arc::new(Notify::new()),
        }
    }

    pub fn from_config(cfg: &Config, engine: Arc<RetentionEngine>, bus: Bus) -> Self {
        Self::new(
            engine,
            bus,
            cfg.cleanup_interval,
            cfg.emergency_headroom_gb,
            cfg.startup_headroom_gb,
        )
    }

    /// Signal that wakes [`run`](Self::run) for an immediate pass.
    ///
    /// Workers refused for lack of space call `notify_one()` on it.
    pub fn pressure(&self) -> Arc<Notify> {
        Arc::clone(&self.pressure)
    }

    pub fn engine(&self) -> &Arc<RetentionEngine> {
        &self.engine
    }

    /// Startup check: frees space down to `floor + startup headroom` if needed.
    ///
    /// # Errors
    /// [`RuntimeError::InsufficientSpace`] when free space is still below the floor.
    pub async fn preflight(&self) -> Result<(), RuntimeError> {
        let engine = Arc::clone(&self.engine);
        self.engine_call(move || engine.log_storage_info()).await;

        let engine = Arc::clone(&self.engine);
        if self
            .engine_call(move || engine.has_enough_space())
            .await
            .unwrap_or(false)
        {
            return Ok(());
        }

        let min_gb = self.engine.policy().min_free_space_gb;
        let target = min_gb.saturating_add(self.startup_headroom_gb);
        warn!(min_gb, target_gb = target, "insufficient space at startup, evicting");
        self.evict(target).await;

        let engine = Arc::clone(&self.engine);
        if self
            .engine_call(move || engine.has_enough_space())
            .await
            .unwrap_or(false)
        {
            return Ok(());
        }
        let engine = Arc::clone(&self.engine);
        let free_gb = self
            .engine_call(move || engine.free_space_gb())
            .await
            .unwrap_or(0);
        Err(RuntimeError::InsufficientSpace { free_gb, min_gb })
    }

    /// One pass: storage info, age cleanup, then eviction if still below the floor.
    pub async fn run_pass(&self) -> PassReport {
        let engine = Arc::clone(&self.engine);
        let cleanup = self
            .engine_call(move || {
                engine.log_storage_info();
                engine.scheduled_cleanup()
            })
            .await
            .unwrap_or_default();
        if cleanup.deleted > 0 {
            self.bus.publish(
                Event::new(EventKind::CleanupCompleted)
                    .with_count(cleanup.deleted as u64)
                    .with_bytes(cleanup.freed_bytes),
            );
        }

        let engine = Arc::clone(&self.engine);
        let enough = self
            .engine_call(move || engine.has_enough_space())
            .await
            .unwrap_or(false);
        if enough {
            return PassReport {
                cleanup,
                eviction: None,
            };
        }

        let min_gb = self.engine.policy().min_free_space_gb;
        self.bus.publish(
            Event::new(EventKind::SpaceLow).with_reason(format!("below {min_gb}GB floor after cleanup")),
        );
        let eviction = self
            .evict(min_gb.saturating_add(self.emergency_headroom_gb))
            .await;
        PassReport { cleanup, eviction }
    }

    /// Runs passes every interval (or on pressure) until `token` is cancelled.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "maintenance started");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.pressure.notified() => {
                    info!("space pressure signalled, running maintenance now");
                }
            }
            self.run_pass().await;
        }
        info!("maintenance stopped");
    }

    async fn evict(&self, target_gb: u64) -> Option<EvictionReport> {
        let engine = Arc::clone(&self.engine);
        let report = self
            .engine_call(move || engine.emergency_eviction(target_gb))
            .await?;
        self.bus.publish(
            Event::new(EventKind::EmergencyEviction)
                .with_count(report.deleted as u64)
                .with_bytes(report.freed_bytes)
                .with_reason(format!("target {target_gb}GB, now {}GB free", report.free_gb)),
        );
        Some(report)
    }

    async fn engine_call<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match tokio::task::spawn_blocking(f).await {
            Ok(v) => Some(v),
            Err(err) => {
                error!(error = %err, "retention task failed");
                None
            }
        }
    }
}
