//! # Runtime events emitted by camera workers, maintenance and the fleet.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Worker lifecycle**: admission, launch, exit, backoff, permanent failure
//! - **Storage**: space pressure, completed segments, cleanup and eviction passes
//! - **Fleet**: shutdown requested, all workers stopped
//! - **Subscriber**: overflow and panic of event consumers
//!
//! The [`Event`] struct carries additional metadata such as the camera id,
//! resource class, failure counters, backoff delays and file paths.
//!
//! Subscribers drain their queues independently, so two subscribers may observe the
//! same events at different times. `seq` is process-wide and strictly increasing;
//! sort by it when cross-subscriber order matters.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use camvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_worker("cam-7")
//!     .with_reason("process exited unexpectedly: exit status: 1")
//!     .with_failures(4)
//!     .with_delay(Duration::from_secs(10));
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.worker.as_deref(), Some("cam-7"));
//! assert_eq!(ev.delay_ms, Some(10_000));
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // subscribers
    /// `on_event` panicked; the subscriber keeps draining.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// An event was dropped for one subscriber.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // fleet
    /// Shutdown requested (OS signal observed or `stop_all` called).
    ShutdownRequested,

    /// Every worker reached `Stopped` or `Failed` and all slots are back.
    ///
    /// Sets:
    /// - `count`: number of workers joined
    AllStopped,

    // worker lifecycle
    /// Worker left `Stopped`/`Backoff` and is trying to get admitted.
    ///
    /// Sets:
    /// - `worker`: camera id
    /// - `failures`: consecutive failures so far
    WorkerStarting,

    /// Admission was deferred (no slot or no space); not counted as a failure.
    ///
    /// Sets:
    /// - `worker`: camera id
    /// - `reason`: what is missing
    /// - `delay_ms`: wait before the next admission check
    AdmissionDeferred,

    /// External process is running.
    ///
    /// Sets:
    /// - `worker`: camera id
    /// - `class`: resource class holding the slot
    /// - `pid`: process id, if known
    WorkerRunning,

    /// A worker with prior failures launched successfully; its counter was reset.
    ///
    /// Sets:
    /// - `worker`: camera id
    /// - `failures`: the counter value before the reset
    WorkerRecovered,

    /// External process exited on its own.
    ///
    /// Sets:
    /// - `worker`: camera id
    /// - `reason`: exit status
    ProcessExited,

    /// Next start attempt scheduled after a counted failure.
    ///
    /// Sets:
    /// - `worker`: camera id
    /// - `failures`: consecutive failures
    /// - `delay_ms`: delay before the next attempt
    /// - `reason`: last failure message
    BackoffScheduled,

    /// Retry budget exhausted; the worker stays `Failed` until restarted.
    ///
    /// Sets:
    /// - `worker`: camera id
    /// - `failures`: consecutive failures
    /// - `reason`: last failure message
    WorkerFailed,

    /// Worker reached `Stopped` after cancellation.
    ///
    /// Sets:
    /// - `worker`: camera id
    WorkerStopped,

    /// Process ignored the polite stop and was killed.
    ///
    /// Sets:
    /// - `worker`: camera id
    /// - `pid`: process id, if known
    ForceKilled,

    // storage
    /// Free space fell below the floor.
    ///
    /// Sets:
    /// - `worker`: camera id (if observed by a worker)
    /// - `reason`: free vs. floor
    SpaceLow,

    /// A recording segment was closed by the encoder.
    ///
    /// Sets:
    /// - `worker`: camera id
    /// - `path`: file path
    /// - `bytes`: file size
    SegmentCompleted,

    /// Age-based cleanup pass finished.
    ///
    /// Sets:
    /// - `count`: files deleted
    /// - `bytes`: bytes freed
    CleanupCompleted,

    /// Emergency eviction pass finished.
    ///
    /// Sets:
    /// - `count`: files deleted
    /// - `bytes`: bytes freed
    /// - `reason`: target free space
    EmergencyEviction,
}

/// One fleet event. Only `seq`, `at` and `kind` are always present; the rest depend
/// on the kind (a `ProcessExited` carries the exit status in `reason`, a `SegmentCompleted`
/// carries `path` and `bytes`).
#[derive(Clone, Debug)]
pub struct Event {
    pub seq: u64,
    pub at: SystemTime,
    pub kind: EventKind,

    /// Camera id (or subscriber name for subscriber events).
    pub worker: Option<Arc<str>>,
    /// Resource class name.
    pub class: Option<Arc<str>>,
    /// Error text, exit status or overflow detail.
    pub reason: Option<Arc<str>>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Consecutive failure count.
    pub failures: Option<u32>,
    /// External process id.
    pub pid: Option<u32>,
    /// File path (segments).
    pub path: Option<PathBuf>,
    /// Byte count (segment size, bytes freed).
    pub bytes: Option<u64>,
    /// Item count (files deleted, workers joined).
    pub count: Option<u64>,
}

impl Event {
    /// Stamps a new event with the next sequence number and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            class: None,
            reason: None,
            delay_ms: None,
            failures: None,
            pid: None,
            path: None,
            bytes: None,
            count: None,
        }
    }

    /// Attaches a camera id.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a resource class name.
    #[inline]
    pub fn with_class(mut self, class: impl Into<Arc<str>>) -> Self {
        self.class = Some(class.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(u32::try_from(d.as_millis()).unwrap_or(u32::MAX));
        self
    }

    /// Attaches the consecutive failure count.
    #[inline]
    pub fn with_failures(mut self, n: u32) -> Self {
        self.failures = Some(n);
        self
    }

    /// Attaches a process id, if any.
    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    #[inline]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[inline]
    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }

    #[inline]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// A subscriber queue refused an event (`reason` is "full" or "closed").
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
