//! # Fleet: coordinates camera workers, shared collaborators and shutdown.
//!
//! The [`Fleet`] owns the event bus, the [`SubscriberSet`], the resource pool, the
//! retention engine and the worker [`Registry`]. It loads the roster from the
//! catalog, spawns one [`WorkerActor`] per camera, reports status periodically and
//! tears everything down on a termination signal.
//!
//! ## High-level architecture
//! ```text
//! run():
//!   ConnectivityGuard::connect_with_retry()
//!   Maintenance::preflight()            (evicts down to floor + headroom, or fails)
//!   load_roster()  ──► ClassAssigner ──► Registry::insert(CameraWorker)
//!   spawn Maintenance::run(child token)
//!   start_all()    ──► WorkerActor::run(child token)   (one per camera)
//!
//!   loop select! {
//!     shutdown signal   ─► break
//!     status ticker     ─► log_status()
//!   }
//!   stop_all():
//!     Bus.publish(ShutdownRequested)
//!     cancel every worker token ─► SIGTERM, grace, SIGKILL (per worker, concurrent)
//!     join all ─► Bus.publish(AllStopped)
//!   runtime_token.cancel()
//!
//! Event flow:
//!   WorkerActor / Maintenance ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                          ┌──────────┴──────────┐
//!                                                          ▼                     ▼
//!                                                      LogWriter          CatalogWriter
//! ```
//!
//! ## Rules
//! - Each camera id is loaded once; reloading the roster only adds new cameras.
//! - Two cameras never share a recording directory.
//! - `stop_all` returns only after every worker released its slot and its process.
//! - `restart_worker` only re-arms workers in the `Failed` state.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::actor::{WorkerActor, WorkerContext, WorkerParams};
use super::registry::{Registry, SpawnRequest, WorkerOutcome};
use super::shutdown;
use super::state::{CameraWorker, WorkerStatus};
use crate::catalog::ConnectivityGuard;
use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::gateway::DependencyHealthMonitor;
use crate::process::{safe_name, Launcher};
use crate::resources::{ClassAssigner, ResourcePool};
use crate::storage::{Maintenance, RetentionEngine};
use crate::subscribers::SubscriberSet;

/// Coordinates camera workers, event delivery and graceful shutdown.
///
/// Built through [`FleetBuilder`](super::FleetBuilder).
pub struct Fleet {
    /// Global runtime configuration.
    pub cfg: Config,
    /// Event bus shared with all workers.
    pub bus: Bus,
    /// Fan-out set for subscribers.
    pub subs: Arc<SubscriberSet>,
    pool: Arc<ResourcePool>,
    retention: Arc<RetentionEngine>,
    maintenance: Arc<Maintenance>,
    launcher: Arc<dyn Launcher>,
    catalog: Arc<ConnectivityGuard>,
    gateway: Option<Arc<DependencyHealthMonitor>>,
    registry: Registry,
    assigner: Mutex<ClassAssigner>,
    params: Arc<WorkerParams>,
    runtime_token: CancellationToken,
}

/// Collaborators handed over by the builder.
pub(crate) struct FleetParts {
    pub cfg: Config,
    pub bus: Bus,
    pub subs: Arc<SubscriberSet>,
    pub pool: Arc<ResourcePool>,
    pub retention: Arc<RetentionEngine>,
    pub maintenance: Arc<Maintenance>,
    pub launcher: Arc<dyn Launcher>,
    pub catalog: Arc<ConnectivityGuard>,
    pub gateway: Option<Arc<DependencyHealthMonitor>>,
    pub runtime_token: CancellationToken,
}

impl Fleet {
    pub(crate) fn new_internal(parts: FleetParts) -> Self {
        let params = Arc::new(WorkerParams::from_config(&parts.cfg));
        let assigner = Mutex::new(ClassAssigner::new(parts.pool.classes()));
        Self {
            cfg: parts.cfg,
            bus: parts.bus,
            subs: parts.subs,
            pool: parts.pool,
            retention: parts.retention,
            maintenance: parts.maintenance,
            launcher: parts.launcher,
            catalog: parts.catalog,
            gateway: parts.gateway,
            registry: Registry::new(),
            assigner,
            params,
            runtime_token: parts.runtime_token,
        }
    }

    /// Shorthand for [`FleetBuilder::new`](super::FleetBuilder::new).
    pub fn builder(cfg: Config) -> super::FleetBuilder {
        super::FleetBuilder::new(cfg)
    }

    /// Runs the fleet until a termination signal arrives.
    ///
    /// # Errors
    /// - [`RuntimeError::InsufficientSpace`] if the startup preflight cannot free enough space;
    /// - [`RuntimeError::Catalog`] / [`RuntimeError::NoCameras`] if no roster could be loaded;
    /// - [`RuntimeError::Signal`] if signal listeners could not be installed;
    /// - [`RuntimeError::WorkerPanicked`] if a worker task panicked.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        if let Err(err) = self
            .catalog
            .connect_with_retry(self.cfg.catalog.connect_attempts, self.cfg.catalog.connect_base_delay)
            .await
        {
            warn!(error = %err, "catalog not reachable at startup");
        }
        self.maintenance.preflight().await?;

        let loaded = self.load_roster().await?;
        if self.registry.is_empty() {
            return Err(RuntimeError::NoCameras);
        }
        info!(cameras = loaded, "roster loaded");

        let maintenance = tokio::spawn(
            Arc::clone(&self.maintenance).run(self.runtime_token.child_token()),
        );
        let started = self.start_all();
        info!(workers = started, "{}", self.pool.status());

        let signal = self.serve().await;
        let stopped = self.stop_all().await;
        self.runtime_token.cancel();
        if let Err(err) = maintenance.await {
            error!(error = %err, "maintenance task panicked");
        }

        signal?;
        stopped
    }

    /// Waits for a termination signal, logging fleet status every `status_interval`.
    async fn serve(&self) -> Result<(), RuntimeError> {
        let signal = shutdown::wait_for_shutdown_signal();
        tokio::pin!(signal);

        let mut ticker = tokio::time::interval(self.cfg.status_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                res = &mut signal => {
                    let name = res?;
                    info!(signal = name, "shutdown signal received");
                    return Ok(());
                }
                _ = ticker.tick() => self.log_status().await,
            }
        }
    }

    /// Fetches active cameras and registers the ones not yet known.
    ///
    /// Each new worker gets a preferred resource class from a greedy fill in
    /// priority order. A camera whose name maps to a recording directory already
    /// in use is skipped. Returns the number of newly registered workers.
    pub async fn load_roster(&self) -> Result<usize, RuntimeError> {
        let cameras = self.catalog.list_active_cameras().await?;
        if cameras.is_empty() {
            warn!("catalog returned no active cameras");
        }

        let mut dirs: HashSet<String> = self
            .registry
            .statuses()
            .iter()
            .map(|s| safe_name(&s.name))
            .collect();
        let mut assigner = self.assigner.lock();
        let mut added = 0;
        for camera in cameras {
            if self.registry.contains(&camera.id) {
                continue;
            }
            if !dirs.insert(safe_name(&camera.name)) {
                warn!(
                    camera = %camera.id,
                    name = %camera.name,
                    "recording directory already used by another camera, skipped"
                );
                continue;
            }
            let class = assigner
                .assign()
                .map(|c| c.name().to_string())
                .unwrap_or_default();
            info!(camera = %camera.id, name = %camera.name, class = %class, "camera registered");
            if self.registry.insert(CameraWorker::new(camera, class)) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Spawns a supervision loop for every registered worker that has none.
    ///
    /// Returns the number of loops spawned.
    pub fn start_all(&self) -> usize {
        let ctx = self.worker_context();
        self.registry
            .start_idle(&self.runtime_token, |req| spawn_actor(req, ctx.clone()))
    }

    /// Cancels every worker and waits until all of them released their resources.
    ///
    /// Concurrent callers all wait for the same teardown.
    ///
    /// # Errors
    /// [`RuntimeError::WorkerPanicked`] if a worker task panicked; its slot was
    /// released by the lease guard and its status is forced to `Stopped`.
    pub async fn stop_all(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        let joins = self.registry.cancel_all();
        let count = joins.len();
        let outcomes = join_all(
            joins
                .into_iter()
                .map(|(id, join)| async move { (id, join.await) }),
        )
        .await;
        self.registry.clear_cancelled();

        let panicked: Vec<String> = outcomes
            .into_iter()
            .filter(|(_, outcome)| *outcome == WorkerOutcome::Panicked)
            .map(|(id, _)| id)
            .collect();
        for id in &panicked {
            error!(camera = %id, "worker task panicked");
            self.registry.mark_stopped(id);
        }

        self.bus
            .publish(Event::new(EventKind::AllStopped).with_count(count as u64));
        info!(workers = count, "{}", self.pool.status());

        if panicked.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::WorkerPanicked { workers: panicked })
        }
    }

    /// Point-in-time status of every worker, ordered by camera id.
    pub fn status_report(&self) -> Vec<WorkerStatus> {
        self.registry.statuses()
    }

    /// Status of one worker.
    pub fn worker_status(&self, id: &str) -> Option<WorkerStatus> {
        self.registry.status(id)
    }

    /// Follows the status of one worker.
    pub fn watch_worker(&self, id: &str) -> Option<tokio::sync::watch::Receiver<WorkerStatus>> {
        self.registry.watch(id)
    }

    /// Re-arms a `Failed` worker with a fresh retry budget.
    ///
    /// Returns `false` for unknown ids and for workers that are not `Failed`.
    pub fn restart_worker(&self, id: &str) -> bool {
        let ctx = self.worker_context();
        let restarted = self
            .registry
            .restart_failed(id, &self.runtime_token, |req| spawn_actor(req, ctx.clone()));
        if restarted {
            info!(camera = %id, "failed worker restarted");
        }
        restarted
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn pool(&self) -> &Arc<ResourcePool> {
        &self.pool
    }

    pub fn retention(&self) -> &Arc<RetentionEngine> {
        &self.retention
    }

    pub fn maintenance(&self) -> &Arc<Maintenance> {
        &self.maintenance
    }

    pub fn catalog(&self) -> &Arc<ConnectivityGuard> {
        &self.catalog
    }

    /// Logs one line per worker, the pool usage and the gateway health.
    pub async fn log_status(&self) {
        for status in self.registry.statuses() {
            info!(target: "camvisor::status", "{status}");
        }
        info!(target: "camvisor::status", "{}", self.pool.status());
        if let Some(gateway) = &self.gateway {
            let healthy = gateway.is_healthy().await;
            info!(target: "camvisor::status", healthy, "gateway: {}", gateway.status());
        }
    }

    fn worker_context(&self) -> WorkerContext {
        WorkerContext {
            params: Arc::clone(&self.params),
            pool: Arc::clone(&self.pool),
            retention: Arc::clone(&self.retention),
            launcher: Arc::clone(&self.launcher),
            bus: self.bus.clone(),
            pressure: self.maintenance.pressure(),
            gateway: self.gateway.clone(),
        }
    }
}

fn spawn_actor(req: SpawnRequest, ctx: WorkerContext) -> tokio::task::JoinHandle<super::WorkerExit> {
    let actor = WorkerActor::new(req.worker, ctx, req.status);
    tokio::spawn(actor.run(req.cancel))
}
