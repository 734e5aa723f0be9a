//! Runtime core: per-camera supervision and fleet orchestration.
//!
//! The public entry point is [`Fleet`], built through [`FleetBuilder`].
//!
//! Internal modules:
//! - [`state`]: worker state machine and status snapshots;
//! - [`actor`]: supervises one camera (admission, launch, polling, backoff);
//! - [`runner`]: cooperative stop with force-kill fallback;
//! - [`registry`]: worker slots, status channels and run handles;
//! - [`fleet`]: roster loading, start/stop of all workers, status reporting;
//! - [`shutdown`]: OS termination signals.

mod actor;
mod builder;
mod fleet;
mod registry;
mod runner;
mod shutdown;
mod state;

pub use actor::{WorkerActor, WorkerContext, WorkerExit, WorkerParams};
pub use builder::FleetBuilder;
pub use fleet::Fleet;
pub use registry::WorkerOutcome;
pub use runner::{stop_process, StopOutcome};
pub use shutdown::wait_for_shutdown_signal;
pub use state::{CameraWorker, WorkerState, WorkerStatus};
