//! # Worker registry.
//!
//! Owns every [`CameraWorker`] of the fleet, its status channel and, while a
//! supervision loop exists, its run handle (cancellation token + shared join).
//!
//! ## Rules
//! - Keyed by camera id; ids are unique, iteration is ordered by id.
//! - The status sender outlives run handles, so a restarted worker keeps
//!   publishing into the same channel.
//! - Joins are [`Shared`], so concurrent `stop_all` callers can all wait on the
//!   same teardown.
//! - The lock is never held across an `.await`.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::actor::WorkerExit;
use super::state::{CameraWorker, WorkerState, WorkerStatus};

/// How a worker task ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerOutcome {
    Exited(WorkerExit),
    Panicked,
}

pub(crate) type WorkerJoin = Shared<BoxFuture<'static, WorkerOutcome>>;

struct RunHandle {
    cancel: CancellationToken,
    join: WorkerJoin,
}

struct WorkerSlot {
    worker: CameraWorker,
    status: Arc<watch::Sender<WorkerStatus>>,
    run: Option<RunHandle>,
}

/// Everything needed to spawn one supervision loop.
pub(crate) struct SpawnRequest {
    pub worker: CameraWorker,
    pub status: Arc<watch::Sender<WorkerStatus>>,
    pub cancel: CancellationToken,
}

#[derive(Default)]
pub struct Registry {
    workers: RwLock<BTreeMap<String, WorkerSlot>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a worker in `Stopped` state; `false` if the id is already known.
    pub fn insert(&self, worker: CameraWorker) -> bool {
        let mut workers = self.workers.write();
        if workers.contains_key(worker.id()) {
            return false;
        }
        let (status, _rx) = watch::channel(WorkerStatus::new(&worker));
        workers.insert(
            worker.id().to_string(),
            WorkerSlot {
                worker,
                status: Arc::new(status),
                run: None,
            },
        );
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.workers.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.workers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.read().is_empty()
    }

    /// Snapshot of every worker, ordered by id.
    pub fn statuses(&self) -> Vec<WorkerStatus> {
        self.workers
            .read()
            .values()
            .map(|slot| slot.status.borrow().clone())
            .collect()
    }

    pub fn status(&self, id: &str) -> Option<WorkerStatus> {
        self.workers
            .read()
            .get(id)
            .map(|slot| slot.status.borrow().clone())
    }

    /// Receiver following one worker's status.
    pub fn watch(&self, id: &str) -> Option<watch::Receiver<WorkerStatus>> {
        self.workers.read().get(id).map(|slot| slot.status.subscribe())
    }

    /// Spawns a loop for every worker that has none; returns how many were spawned.
    pub(crate) fn start_idle<F>(&self, parent: &CancellationToken, mut spawn: F) -> usize
    where
        F: FnMut(SpawnRequest) -> JoinHandle<WorkerExit>,
    {
        let mut workers = self.workers.write();
        let mut started = 0;
        for slot in workers.values_mut().filter(|s| s.run.is_none()) {
            slot.run = Some(Self::spawn_slot(slot, parent, &mut spawn));
            started += 1;
        }
        started
    }

    /// Replaces the loop of a `Failed` worker with a fresh one.
    pub(crate) fn restart_failed<F>(&self, id: &str, parent: &CancellationToken, mut spawn: F) -> bool
    where
        F: FnMut(SpawnRequest) -> JoinHandle<WorkerExit>,
    {
        let mut workers = self.workers.write();
        let Some(slot) = workers.get_mut(id) else {
            return false;
        };
        if slot.status.borrow().state != WorkerState::Failed {
            return false;
        }
        if let Some(old) = slot.run.take() {
            old.cancel.cancel();
        }
        slot.run = Some(Self::spawn_slot(slot, parent, &mut spawn));
        true
    }

    /// Cancels every loop and returns the joins to wait on.
    pub(crate) fn cancel_all(&self) -> Vec<(String, WorkerJoin)> {
        let workers = self.workers.read();
        workers
            .iter()
            .filter_map(|(id, slot)| {
                slot.run.as_ref().map(|run| {
                    run.cancel.cancel();
                    (id.clone(), run.join.clone())
                })
            })
            .collect()
    }

    /// Forgets run handles whose loop was cancelled, so `start_idle` can start them again.
    pub(crate) fn clear_cancelled(&self) {
        let mut workers = self.workers.write();
        for slot in workers.values_mut() {
            if slot.run.as_ref().is_some_and(|r| r.cancel.is_cancelled()) {
                slot.run = None;
            }
        }
    }

    /// Marks a worker whose task panicked as stopped.
    pub(crate) fn mark_stopped(&self, id: &str) {
        if let Some(slot) = self.workers.read().get(id) {
            slot.status.send_modify(|s| {
                s.state = WorkerState::Stopped;
                s.class = None;
                s.pid = None;
                s.last_error = Some("worker task panicked".to_string());
            });
        }
    }

    fn spawn_slot<F>(slot: &WorkerSlot, parent: &CancellationToken, spawn: &mut F) -> RunHandle
    where
        F: FnMut(SpawnRequest) -> JoinHandle<WorkerExit>,
    {
        let cancel = parent.child_token();
        let join = spawn(SpawnRequest {
            worker: slot.worker.clone(),
            status: Arc::clone(&slot.status),
            cancel: cancel.clone(),
        });
        let join = join
            .map(|res| match res {
                Ok(exit) => WorkerOutcome::Exited(exit),
                Err(_) => WorkerOutcome::Panicked,
            })
            .boxed()
            .shared();
        RunHandle { cancel, join }
    }
}
