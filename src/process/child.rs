//! # `tokio::process` implementation of the process contract.
//!
//! [`ChildLauncher`] spawns the transcoder with stdin closed and stderr appended to the
//! camera's log file. A process that dies within the startup probe window is reported as
//! a `LaunchFailure` rather than a successful launch.
//!
//! [`ChildHandle`] polls with `try_wait`, stops cooperatively with SIGTERM and forcibly
//! with SIGKILL, always reaping the child.

use std::fs::OpenOptions;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::error::WorkerError;
use crate::process::command::CommandSpec;
use crate::process::handle::{Launcher, ProcessHandle};

/// Spawns external processes as tokio child processes.
#[derive(Debug, Clone)]
pub struct ChildLauncher {
    startup_probe: Duration,
}

impl ChildLauncher {
    /// Creates a launcher; `startup_probe = 0` disables the early-exit probe.
    pub fn new(startup_probe: Duration) -> Self {
        Self { startup_probe }
    }

    fn stderr_for(spec: &CommandSpec) -> Stdio {
        let Some(path) = &spec.log_file else {
            return Stdio::null();
        };
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Stdio::from(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot open process log, discarding stderr");
                Stdio::null()
            }
        }
    }
}

impl Default for ChildLauncher {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl Launcher for ChildLauncher {
    async fn launch(&self, spec: &CommandSpec) -> Result<Box<dyn ProcessHandle>, WorkerError> {
        tokio::fs::create_dir_all(&spec.output_dir)
            .await
            .map_err(|e| WorkerError::LaunchFailure {
                reason: format!("cannot create {}: {e}", spec.output_dir.display()),
            })?;

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Self::stderr_for(spec))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::LaunchFailure {
                reason: format!("cannot spawn {}: {e}", spec.program),
            })?;

        if !self.startup_probe.is_zero() {
            tokio::time::sleep(self.startup_probe).await;
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Err(WorkerError::LaunchFailure {
                        reason: format!("exited during startup: {status}"),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    return Err(WorkerError::LaunchFailure {
                        reason: format!("cannot poll after spawn: {e}"),
                    });
                }
            }
        }

        Ok(Box::new(ChildHandle::new(child)))
    }
}

/// Handle to a spawned tokio child process.
#[derive(Debug)]
pub struct ChildHandle {
    child: Child,
    pid: Option<u32>,
    exit: Option<String>,
}

impl ChildHandle {
    /// Wraps a spawned child.
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            exit: None,
        }
    }

    fn record_exit(&mut self, status: ExitStatus) {
        self.exit = Some(status.to_string());
    }
}

#[async_trait]
impl ProcessHandle for ChildHandle {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn is_alive(&mut self) -> bool {
        if self.exit.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.record_exit(status);
                false
            }
            Err(e) => {
                self.exit = Some(format!("wait error: {e}"));
                false
            }
        }
    }

    fn exit_status(&self) -> Option<String> {
        self.exit.clone()
    }

    fn request_stop(&mut self) {
        if !self.is_alive() {
            return;
        }
        let Some(pid) = self.pid.and_then(|p| i32::try_from(p).ok()) else {
            return;
        };
        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::warn!(pid, error = %e, "SIGTERM failed"),
        }
    }

    async fn force_stop(&mut self) {
        if self.exit.is_some() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(pid = ?self.pid, error = %e, "kill on exited process");
        }
        match self.child.wait().await {
            Ok(status) => self.record_exit(status),
            Err(e) => self.exit = Some(format!("wait error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(program: &str, args: &[&str], dir: &std::path::Path) -> CommandSpec {
        CommandSpec {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            output_dir: dir.to_path_buf(),
            log_file: Some(dir.join("proc.log")),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ChildLauncher::new(Duration::ZERO);
        let err = launcher
            .launch(&spec("/nonexistent/transcoder", &[], dir.path()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "launch_failure");
    }

    #[tokio::test]
    async fn test_early_exit_is_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ChildLauncher::new(Duration::from_millis(300));
        let err = launcher
            .launch(&spec("false", &[], dir.path()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, WorkerError::LaunchFailure { .. }));
    }

    #[tokio::test]
    async fn test_stop_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ChildLauncher::new(Duration::from_millis(50));
        let mut handle = launcher
            .launch(&spec("sleep", &["30"], dir.path()))
            .await
            .unwrap();
        assert!(handle.is_alive());
        assert!(handle.id().is_some());

        handle.request_stop();
        for _ in 0..50 {
            if !handle.is_alive() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.force_stop().await;
        assert!(!handle.is_alive());
        assert!(handle.exit_status().is_some());

        handle.request_stop();
        handle.force_stop().await;
        assert!(dir.path().join("proc.log").exists());
    }
}
