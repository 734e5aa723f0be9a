//! # Worker lifecycle states and status snapshots.
//!
//! ```text
//!            ┌──────────────── admission wait (no transition) ─┐
//!            ▼                                                 │
//! Stopped ─► Starting ──launch ok──► Running ──exit──► Backoff ┤
//!   ▲           │                                         │    │
//!   │           └──launch failed───────────────────────►──┘    │
//!   │                                                     │    │
//!   │                         failures ≥ max_retries ─► Failed │
//!   │                                                     │    │
//!   └──── cancel (from any non-terminal state) ◄──────────┴────┘
//!
//! Failed ─► Starting only through Fleet::restart_worker.
//! ```

use std::fmt;

use crate::catalog::CameraRecord;

/// Lifecycle state of one camera worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Stopped,
    Starting,
    Running,
    Backoff,
    /// Retry budget exhausted; needs an explicit restart.
    Failed,
}

impl WorkerState {
    /// Legal edges of the state machine.
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Backoff)
                | (Starting, Stopped)
                | (Running, Backoff)
                | (Running, Stopped)
                | (Backoff, Starting)
                | (Backoff, Failed)
                | (Backoff, Stopped)
                | (Failed, Starting)
        )
    }

    /// `Stopped` and `Failed` end a supervision loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Stopped => "stopped",
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Backoff => "backoff",
            WorkerState::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one supervised camera plus its advisory resource class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraWorker {
    pub camera: CameraRecord,
    /// Class picked by the fleet's greedy assignment; the pool may fall back.
    pub preferred_class: String,
}

impl CameraWorker {
    pub fn new(camera: CameraRecord, preferred_class: impl Into<String>) -> Self {
        Self {
            camera,
            preferred_class: preferred_class.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.camera.id
    }

    pub fn name(&self) -> &str {
        &self.camera.name
    }
}

/// Point-in-time view of a worker, published through a watch channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerStatus {
    pub id: String,
    pub name: String,
    pub state: WorkerState,
    pub consecutive_failures: u32,
    /// Class of the held slot; `None` whenever no slot is held.
    pub class: Option<String>,
    pub pid: Option<u32>,
    pub last_error: Option<String>,
}

impl WorkerStatus {
    pub fn new(worker: &CameraWorker) -> Self {
        Self {
            id: worker.id().to_string(),
            name: worker.name().to_string(),
            state: WorkerState::Stopped,
            consecutive_failures: 0,
            class: None,
            pid: None,
            last_error: None,
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.id, self.state)?;
        if let Some(class) = &self.class {
            write!(f, " on {class}")?;
        }
        if self.consecutive_failures > 0 {
            write!(f, ", {} failures", self.consecutive_failures)?;
        }
        Ok(())
    }
}
