//! # Connectivity guard around a [`Catalog`].
//!
//! Every call goes through [`ConnectivityGuard`]:
//!
//! ```text
//! call(op)
//!   ├─ ensure_connection(): ping, else connect_with_retry(attempts, base)
//!   ├─ op()
//!   └─ op() failed with Unavailable?
//!         └─ connect_with_retry ──► op() once more (never a second retry)
//! ```
//!
//! Reconnect delays grow linearly: `base × attempt`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{CameraRecord, CameraStatus, Catalog, SegmentRecord};
use crate::error::CatalogError;

/// Reconnecting wrapper used for every catalog access.
pub struct ConnectivityGuard {
    catalog: Arc<dyn Catalog>,
    attempts: u32,
    base_delay: Duration,
    reconnects: AtomicU64,
    reconnecting: Mutex<()>,
}

impl ConnectivityGuard {
    /// Wraps `catalog`; reconnects use `attempts` tries spaced by `base_delay × attempt`.
    pub fn new(catalog: Arc<dyn Catalog>, attempts: u32, base_delay: Duration) -> Self {
        Self {
            catalog,
            attempts: attempts.max(1),
            base_delay,
            reconnects: AtomicU64::new(0),
            reconnecting: Mutex::new(()),
        }
    }

    /// Single connection attempt.
    pub async fn connect(&self) -> Result<(), CatalogError> {
        self.catalog.connect().await
    }

    /// Tries to connect up to `max_attempts` times, sleeping `base_delay × attempt`
    /// between failures. Returns the last error if every attempt failed.
    pub async fn connect_with_retry(
        &self,
        max_attempts: u32,
        base_delay: Duration,
    ) -> Result<(), CatalogError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.catalog.connect().await {
                Ok(()) => {
                    if attempt > 1 {
                        info!(attempt, "catalog connection established");
                    }
                    return Ok(());
                }
                Err(err) if attempt < max_attempts => {
                    let delay = base_delay.saturating_mul(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "catalog connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "catalog connect failed, giving up");
                    return Err(err);
                }
            }
        }
    }

    /// Lightweight liveness probe.
    pub async fn is_alive(&self) -> bool {
        self.catalog.ping().await.is_ok()
    }

    /// Probes the connection and reconnects (with retry) if the probe fails.
    pub async fn ensure_connection(&self) -> Result<(), CatalogError> {
        if self.is_alive().await {
            return Ok(());
        }
        self.reconnect().await
    }

    /// Number of successful reconnects so far.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub async fn list_active_cameras(&self) -> Result<Vec<CameraRecord>, CatalogError> {
        self.call(|c| async move { c.list_active_cameras().await })
            .await
    }

    pub async fn set_camera_status(
        &self,
        id: &str,
        status: CameraStatus,
    ) -> Result<(), CatalogError> {
        self.call(|c| {
            let id = id.to_string();
            async move { c.set_camera_status(&id, status).await }
        })
        .await
    }

    pub async fn record_completed_segment(
        &self,
        segment: &SegmentRecord,
    ) -> Result<(), CatalogError> {
        self.call(|c| {
            let segment = segment.clone();
            async move { c.record_completed_segment(&segment).await }
        })
        .await
    }

    async fn reconnect(&self) -> Result<(), CatalogError> {
        let _serialized = self.reconnecting.lock().await;
        // Another caller may have reconnected while we waited.
        if self.is_alive().await {
            return Ok(());
        }
        warn!("catalog connection lost, reconnecting");
        self.connect_with_retry(self.attempts, self.base_delay)
            .await?;
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn call<T, F, Fut>(&self, op: F) -> Result<T, CatalogError>
    where
        F: Fn(Arc<dyn Catalog>) -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        self.ensure_connection().await?;
        match op(Arc::clone(&self.catalog)).await {
            Err(err) if err.is_connection_error() => {
                debug!(error = %err, "catalog call failed on connection, retrying once");
                self.reconnect().await?;
                op(Arc::clone(&self.catalog)).await
            }
            other => other,
        }
    }
}
