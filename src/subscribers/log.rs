//! # LogWriter: events as `tracing` records.
//!
//! Lifecycle noise goes to `debug`, state changes an operator cares about to
//! `info`, and anything that needs attention to `warn`/`error`.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  camvisor::events: worker running camera="cam1" class="nvenc" pid=4242
//! WARN  camvisor::events: backoff scheduled camera="cam1" failures=4 delay_ms=10000 reason="..."
//! ERROR camvisor::events: worker failed permanently camera="cam1" failures=10
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Renders every event as a structured `tracing` record under target `camvisor::events`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let camera = e.worker.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::SubscriberPanicked => {
                error!(target: "camvisor::events", subscriber = camera, info = reason, "subscriber panicked");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "camvisor::events", subscriber = camera, reason, "subscriber dropped event");
            }
            EventKind::ShutdownRequested => {
                info!(target: "camvisor::events", "shutdown requested");
            }
            EventKind::AllStopped => {
                info!(target: "camvisor::events", workers = e.count, "all workers stopped");
            }
            EventKind::WorkerStarting => {
                debug!(target: "camvisor::events", camera, failures = e.failures, "worker starting");
            }
            EventKind::AdmissionDeferred => {
                info!(target: "camvisor::events", camera, reason, delay_ms = e.delay_ms, "admission deferred");
            }
            EventKind::WorkerRunning => {
                info!(
                    target: "camvisor::events",
                    camera,
                    class = e.class.as_deref().unwrap_or("-"),
                    pid = e.pid,
                    "worker running"
                );
            }
            EventKind::WorkerRecovered => {
                info!(target: "camvisor::events", camera, after_failures = e.failures, "worker recovered");
            }
            EventKind::ProcessExited => {
                warn!(target: "camvisor::events", camera, status = reason, "recording process exited");
            }
            EventKind::BackoffScheduled => {
                warn!(
                    target: "camvisor::events",
                    camera,
                    failures = e.failures,
                    delay_ms = e.delay_ms,
                    reason,
                    "backoff scheduled"
                );
            }
            EventKind::WorkerFailed => {
                error!(
                    target: "camvisor::events",
                    camera,
                    failures = e.failures,
                    reason,
                    "worker failed permanently"
                );
            }
            EventKind::WorkerStopped => {
                info!(target: "camvisor::events", camera, "worker stopped");
            }
            EventKind::ForceKilled => {
                warn!(target: "camvisor::events", camera, pid = e.pid, "process killed after grace period");
            }
            EventKind::SpaceLow => {
                warn!(target: "camvisor::events", camera, reason, "free space below floor");
            }
            EventKind::SegmentCompleted => {
                debug!(
                    target: "camvisor::events",
                    camera,
                    path = ?e.path,
                    bytes = e.bytes,
                    "segment completed"
                );
            }
            EventKind::CleanupCompleted => {
                info!(target: "camvisor::events", files = e.count, bytes = e.bytes, "retention cleanup completed");
            }
            EventKind::EmergencyEviction => {
                warn!(
                    target: "camvisor::events",
                    files = e.count,
                    bytes = e.bytes,
                    reason,
                    "emergency eviction completed"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
