//! # WorkerActor: supervision loop for one camera.
//!
//! Drives one [`CameraWorker`] through its [`WorkerState`] machine:
//! - admission: space first, then a resource slot (both waited out, never counted),
//! - launch through the [`Launcher`] seam,
//! - liveness polling and periodic space/segment checks while running,
//! - counted failures with [`RetryPolicy`] backoff and a permanent `Failed` state,
//! - cooperative cancellation via [`CancellationToken`].
//!
//! ## Architecture
//! ```text
//! Fleet ──► WorkerActor::run(token)
//!
//! loop {
//!   ├─► Starting: admit()
//!   │     ├─ !has_enough_space → SpaceLow + AdmissionDeferred, wake maintenance, wait
//!   │     └─ pool.lease() Err  → AdmissionDeferred, wait
//!   ├─► launch(RecordingCommand, live output only while the gateway is healthy)
//!   │     ├─ Err → drop lease ─────────────────────────────┐
//!   │     └─ Ok  → reset failures, Running                 │
//!   │              └─ supervise(): poll every poll_interval│
//!   │                   ├─ exited → drop lease ────────────┤
//!   │                   └─ cancelled → teardown → Stopped  │
//!   └─► Backoff ◄──────────────────────────────────────────┘
//!         ├─ RetryPolicy::decide → GiveUp  → Failed (exit)
//!         └─ Retry{delay} → BackoffScheduled, sleep (cancellable) → Starting
//! }
//! ```
//!
//! ## Rules
//! - Transitions are sequential and checked against [`WorkerState::can_transition_to`].
//! - At most one [`Lease`] is held; it is dropped before entering `Backoff` and on every
//!   exit path, including panics.
//! - A running recording is never stopped for lack of space; only new launches are refused.
//! - Gateway health is read once per launch. A gateway outage drops the live output of
//!   the next launch but never delays or fails the recording.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{watch, Notify};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::runner;
use super::state::{CameraWorker, WorkerState, WorkerStatus};
use crate::config::Config;
use crate::error::WorkerError;
use crate::events::{Bus, Event, EventKind};
use crate::gateway::DependencyHealthMonitor;
use crate::policies::{RetryDecision, RetryPolicy};
use crate::process::{live_publish_url, safe_name, Launcher, ProcessHandle, RecordingCommand};
use crate::resources::{Lease, ResourcePool};
use crate::storage::{RecordingFile, RetentionEngine, SegmentTracker};

/// Per-worker tunables, shared by every actor of a fleet.
#[derive(Clone, Debug)]
pub struct WorkerParams {
    pub retry: RetryPolicy,
    /// Liveness poll period while running.
    pub poll_interval: Duration,
    /// Free-space and segment check period while running.
    pub space_check_interval: Duration,
    /// Wait between admission attempts.
    pub admission_wait: Duration,
    /// Grace period between SIGTERM and SIGKILL.
    pub stop_grace: Duration,
    pub recording_root: PathBuf,
    pub recording_extension: String,
    pub program: String,
    pub segment_time: Duration,
    /// Live output URL template, `None` when live publishing is off.
    pub live_publish: Option<String>,
}

impl WorkerParams {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            retry: cfg.retry_policy(),
            poll_interval: cfg.poll_interval,
            space_check_interval: cfg.space_check_interval,
            admission_wait: cfg.admission_wait,
            stop_grace: cfg.stop_grace,
            recording_root: cfg.recording_root.clone(),
            recording_extension: cfg.recording_extension.clone(),
            program: cfg.segment.program.clone(),
            segment_time: cfg.segment.segment_time,
            live_publish: Some(cfg.gateway.publish_url.clone()).filter(|url| !url.is_empty()),
        }
    }
}

/// Why a supervision loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// Cancelled; process (if any) torn down.
    Stopped,
    /// Retry budget exhausted.
    Failed,
}

/// Shared collaborators of every actor.
#[derive(Clone)]
pub struct WorkerContext {
    pub params: Arc<WorkerParams>,
    pub pool: Arc<ResourcePool>,
    pub retention: Arc<RetentionEngine>,
    pub launcher: Arc<dyn Launcher>,
    pub bus: Bus,
    /// Wakes the maintenance task when admission is refused for space.
    pub pressure: Arc<Notify>,
    /// Gates the live output; without a monitor the camera is recorded only.
    pub gateway: Option<Arc<DependencyHealthMonitor>>,
}

enum RunOutcome {
    Cancelled,
    Exited(WorkerError),
}

/// Supervises one camera until cancellation or permanent failure.
pub struct WorkerActor {
    worker: CameraWorker,
    ctx: WorkerContext,
    status: Arc<watch::Sender<WorkerStatus>>,
    segments: Option<SegmentTracker>,
    consecutive_failures: u32,
}

impl WorkerActor {
    /// `status` is owned by the fleet so snapshots survive a restart.
    pub fn new(
        worker: CameraWorker,
        ctx: WorkerContext,
        status: Arc<watch::Sender<WorkerStatus>>,
    ) -> Self {
        let dir = ctx.params.recording_root.join(safe_name(worker.name()));
        let segments = SegmentTracker::new(
            dir,
            ctx.params.recording_extension.clone(),
            SystemTime::now(),
        );
        Self {
            worker,
            ctx,
            status,
            segments: Some(segments),
            consecutive_failures: 0,
        }
    }

    /// Runs the supervision loop.
    pub async fn run(mut self, token: CancellationToken) -> WorkerExit {
        self.transition(WorkerState::Starting, |s| {
            s.consecutive_failures = 0;
            s.last_error = None;
        });

        loop {
            self.ctx.bus.publish(
                Event::new(EventKind::WorkerStarting)
                    .with_worker(self.worker.id())
                    .with_failures(self.consecutive_failures),
            );

            let Some(lease) = self.admit(&token).await else {
                return self.stopped();
            };

            let launched = self.launch(&lease).await;
            let err = match launched {
                Ok(handle) => match self.supervise(handle, lease, &token).await {
                    RunOutcome::Cancelled => return self.stopped(),
                    RunOutcome::Exited(err) => err,
                },
                Err(err) => {
                    drop(lease);
                    err
                }
            };

            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            let failures = self.consecutive_failures;
            let reason = err.to_string();
            self.transition(WorkerState::Backoff, |s| {
                s.consecutive_failures = failures;
                s.class = None;
                s.pid = None;
                s.last_error = Some(reason.clone());
            });

            match self.ctx.params.retry.decide(failures) {
                RetryDecision::GiveUp => {
                    self.transition(WorkerState::Failed, |_| {});
                    self.ctx.bus.publish(
                        Event::new(EventKind::WorkerFailed)
                            .with_worker(self.worker.id())
                            .with_failures(failures)
                            .with_reason(reason),
                    );
                    return WorkerExit::Failed;
                }
                RetryDecision::Retry { delay } => {
                    self.ctx.bus.publish(
                        Event::new(EventKind::BackoffScheduled)
                            .with_worker(self.worker.id())
                            .with_failures(failures)
                            .with_delay(delay)
                            .with_reason(reason),
                    );
                    if !sleep_or_cancel(delay, &token).await {
                        return self.stopped();
                    }
                    self.transition(WorkerState::Starting, |_| {});
                }
            }
        }
    }

    /// Waits until there is space and a slot; `None` if cancelled first.
    async fn admit(&self, token: &CancellationToken) -> Option<Lease> {
        loop {
            if token.is_cancelled() {
                return None;
            }
            let deferred = match self.check_space().await {
                Err(err) => {
                    self.ctx.pressure.notify_one();
                    self.ctx.bus.publish(
                        Event::new(EventKind::SpaceLow)
                            .with_worker(self.worker.id())
                            .with_reason(err.to_string()),
                    );
                    err
                }
                Ok(()) => match self.ctx.pool.lease(&self.worker.preferred_class) {
                    Ok(lease) => return Some(lease),
                    Err(_) => WorkerError::ResourceExhausted,
                },
            };

            let reason = deferred.to_string();
            self.status.send_modify(|s| s.last_error = Some(reason.clone()));
            self.ctx.bus.publish(
                Event::new(EventKind::AdmissionDeferred)
                    .with_worker(self.worker.id())
                    .with_reason(reason)
                    .with_delay(self.ctx.params.admission_wait),
            );
            if !sleep_or_cancel(self.ctx.params.admission_wait, token).await {
                return None;
            }
        }
    }

    async fn check_space(&self) -> Result<(), WorkerError> {
        let engine = Arc::clone(&self.ctx.retention);
        let result = tokio::task::spawn_blocking(move || {
            if engine.has_enough_space() {
                Ok(())
            } else {
                Err(WorkerError::SpaceExhausted {
                    free_gb: engine.free_space_gb(),
                    min_gb: engine.policy().min_free_space_gb,
                })
            }
        })
        .await;
        match result {
            Ok(r) => r,
            Err(err) => {
                error!(camera = self.worker.id(), error = %err, "space check task failed");
                Err(WorkerError::SpaceExhausted {
                    free_gb: 0,
                    min_gb: self.ctx.retention.policy().min_free_space_gb,
                })
            }
        }
    }

    async fn launch(&mut self, lease: &Lease) -> Result<Box<dyn ProcessHandle>, WorkerError> {
        let live = self.live_publish_url().await;
        let params = &self.ctx.params;
        let spec = RecordingCommand {
            source_address: &self.worker.camera.source_address,
            camera_name: self.worker.name(),
            recording_root: &params.recording_root,
            encoder: lease.class().encoder(),
            segment_time: params.segment_time,
            extension: &params.recording_extension,
            live_publish: live.as_deref(),
        }
        .build(&params.program);

        let handle = self.ctx.launcher.launch(&spec).await?;

        let pid = handle.id();
        let class = lease.class().name().to_string();
        if self.consecutive_failures > 0 {
            self.ctx.bus.publish(
                Event::new(EventKind::WorkerRecovered)
                    .with_worker(self.worker.id())
                    .with_failures(self.consecutive_failures),
            );
        }
        self.consecutive_failures = 0;
        self.transition(WorkerState::Running, |s| {
            s.consecutive_failures = 0;
            s.class = Some(class.clone());
            s.pid = pid;
            s.last_error = None;
        });
        self.ctx.bus.publish(
            Event::new(EventKind::WorkerRunning)
                .with_worker(self.worker.id())
                .with_class(class)
                .with_pid(pid),
        );
        Ok(handle)
    }

    async fn live_publish_url(&self) -> Option<String> {
        let template = self.ctx.params.live_publish.as_deref()?;
        let gateway = self.ctx.gateway.as_ref()?;
        if gateway.is_healthy().await {
            Some(live_publish_url(template, self.worker.id()))
        } else {
            warn!(camera = %self.worker.id(), "gateway down, launching without live output");
            None
        }
    }

    /// Polls the running process; owns the lease until the process is gone.
    async fn supervise(
        &mut self,
        mut handle: Box<dyn ProcessHandle>,
        lease: Lease,
        token: &CancellationToken,
    ) -> RunOutcome {
        let check_every = self.ctx.params.space_check_interval;
        let mut next_check = Instant::now() + check_every;

        loop {
            if !sleep_or_cancel(self.ctx.params.poll_interval, token).await {
                runner::teardown(
                    handle.as_mut(),
                    self.ctx.params.stop_grace,
                    &self.ctx.bus,
                    self.worker.id(),
                )
                .await;
                drop(lease);
                self.report_segments(true).await;
                return RunOutcome::Cancelled;
            }

            if !handle.is_alive() {
                let status = handle
                    .exit_status()
                    .unwrap_or_else(|| "unknown".to_string());
                drop(lease);
                self.ctx.bus.publish(
                    Event::new(EventKind::ProcessExited)
                        .with_worker(self.worker.id())
                        .with_reason(status.clone()),
                );
                self.report_segments(true).await;
                return RunOutcome::Exited(WorkerError::UnexpectedExit { status });
            }

            if Instant::now() >= next_check {
                next_check = Instant::now() + check_every;
                if let Err(err) = self.check_space().await {
                    warn!(camera = self.worker.id(), error = %err, "low space while recording");
                    self.ctx.bus.publish(
                        Event::new(EventKind::SpaceLow)
                            .with_worker(self.worker.id())
                            .with_reason(err.to_string()),
                    );
                }
                self.report_segments(false).await;
            }
        }
    }

    /// Publishes finished segments; `all` includes the newest (encoder gone).
    async fn report_segments(&mut self, all: bool) {
        let Some(mut tracker) = self.segments.take() else {
            return;
        };
        let scanned = tokio::task::spawn_blocking(move || {
            let files = if all { tracker.flush() } else { tracker.poll() };
            (tracker, files)
        })
        .await;
        let files: Vec<RecordingFile> = match scanned {
            Ok((tracker, files)) => {
                self.segments = Some(tracker);
                files
            }
            Err(err) => {
                error!(camera = self.worker.id(), error = %err, "segment scan failed");
                return;
            }
        };
        for f in files {
            self.ctx.bus.publish(
                Event::new(EventKind::SegmentCompleted)
                    .with_worker(self.worker.id())
                    .with_path(f.path)
                    .with_bytes(f.size),
            );
        }
    }

    fn stopped(&self) -> WorkerExit {
        self.transition(WorkerState::Stopped, |s| {
            s.class = None;
            s.pid = None;
        });
        self.ctx
            .bus
            .publish(Event::new(EventKind::WorkerStopped).with_worker(self.worker.id()));
        WorkerExit::Stopped
    }

    fn transition(&self, next: WorkerState, update: impl FnOnce(&mut WorkerStatus)) {
        self.status.send_modify(|s| {
            let legal = s.state.can_transition_to(next);
            if !legal {
                error!(camera = %s.id, from = %s.state, to = %next, "illegal worker transition");
            }
            debug_assert!(legal, "illegal transition {} -> {}", s.state, next);
            s.state = next;
            update(s);
        });
    }
}

/// Sleeps for `d`; `false` if `token` was cancelled first.
async fn sleep_or_cancel(d: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = time::sleep(d) => true,
    }
}
