//! # Process handle and launcher traits.
//!
//! [`Launcher`] and [`ProcessHandle`] are the seam between the worker state machine and
//! real OS processes, so the supervision policy can be driven by scripted fakes.
//!
//! ## Rules
//! - `is_alive` never blocks; once it returns `false` it keeps returning `false` and
//!   [`ProcessHandle::exit_status`] describes how the process ended
//! - `request_stop` and `force_stop` are idempotent on an already-stopped handle

use async_trait::async_trait;

use crate::error::WorkerError;
use crate::process::command::CommandSpec;

/// Handle to one launched external process.
#[async_trait]
pub trait ProcessHandle: Send + 'static {
    /// OS process id, if known.
    fn id(&self) -> Option<u32>;

    /// Non-blocking liveness poll.
    fn is_alive(&mut self) -> bool;

    /// Description of how the process ended (`None` while still running).
    fn exit_status(&self) -> Option<String>;

    /// Asks the process to terminate cooperatively (e.g. SIGTERM).
    fn request_stop(&mut self);

    /// Terminates the process unconditionally and reaps it.
    async fn force_stop(&mut self);
}

/// Starts external processes from command specifications.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use camvisor::{CommandSpec, Launcher, ProcessHandle, WorkerError};
///
/// struct Refusing;
///
/// #[async_trait]
/// impl Launcher for Refusing {
///     async fn launch(&self, spec: &CommandSpec) -> Result<Box<dyn ProcessHandle>, WorkerError> {
///         Err(WorkerError::LaunchFailure { reason: format!("{} is disabled", spec.program) })
///     }
/// }
/// ```
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Launches the process described by `spec`.
    async fn launch(&self, spec: &CommandSpec) -> Result<Box<dyn ProcessHandle>, WorkerError>;
}
