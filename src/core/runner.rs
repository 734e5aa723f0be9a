//! # Process teardown for one worker.
//!
//! ```text
//! stop_process(handle, grace)
//!   ├─ already dead?             → Exited
//!   ├─ request_stop() (SIGTERM)
//!   ├─ poll is_alive() every 100ms until grace elapses
//!   │     └─ exited in time     → Graceful
//!   └─ force_stop() (SIGKILL)   → Forced
//! ```
//!
//! Both `request_stop` and `force_stop` are idempotent on a dead process, so
//! teardown is safe from any worker state.

use std::time::Duration;

use tokio::time::{self, Instant};

use crate::events::{Bus, Event, EventKind};
use crate::process::ProcessHandle;

const STOP_POLL: Duration = Duration::from_millis(100);

/// How a process ended during teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// It had already exited before teardown.
    Exited,
    /// It exited within the grace period.
    Graceful,
    /// It was killed after the grace period.
    Forced,
}

/// Stops `handle`, escalating to a kill after `grace`.
pub async fn stop_process(handle: &mut dyn ProcessHandle, grace: Duration) -> StopOutcome {
    if !handle.is_alive() {
        return StopOutcome::Exited;
    }
    handle.request_stop();

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        time::sleep(STOP_POLL.min(deadline.saturating_duration_since(Instant::now()))).await;
        if !handle.is_alive() {
            return StopOutcome::Graceful;
        }
    }
    handle.force_stop().await;
    StopOutcome::Forced
}

/// [`stop_process`], publishing `ForceKilled` when the grace period ran out.
pub async fn teardown(
    handle: &mut dyn ProcessHandle,
    grace: Duration,
    bus: &Bus,
    camera: &str,
) -> StopOutcome {
    let pid = handle.id();
    let outcome = stop_process(handle, grace).await;
    if outcome == StopOutcome::Forced {
        bus.publish(
            Event::new(EventKind::ForceKilled)
                .with_worker(camera)
                .with_pid(pid),
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    /// Dies after `ticks` liveness polls once asked to stop; never if `stubborn`.
    struct Fake {
        alive: bool,
        stop_requested: bool,
        ticks: u32,
        stubborn: bool,
        killed: bool,
    }

    impl Fake {
        fn new(ticks: u32, stubborn: bool) -> Self {
            Self {
                alive: true,
                stop_requested: false,
                ticks,
                stubborn,
                killed: false,
            }
        }
    }

    #[async_trait]
    impl ProcessHandle for Fake {
        fn id(&self) -> Option<u32> {
            Some(7)
        }
        fn is_alive(&mut self) -> bool {
            if self.stop_requested && !self.stubborn {
                if self.ticks == 0 {
                    self.alive = false;
                } else {
                    self.ticks -= 1;
                }
            }
            self.alive
        }
        fn exit_status(&self) -> Option<String> {
            (!self.alive).then(|| "signal: 15".to_string())
        }
        fn request_stop(&mut self) {
            self.stop_requested = true;
        }
        async fn force_stop(&mut self) {
            self.killed = true;
            self.alive = false;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_stop() {
        let mut p = Fake::new(3, false);
        let out = stop_process(&mut p, Duration::from_secs(5)).await;
        assert_eq!(out, StopOutcome::Graceful);
        assert!(!p.killed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stubborn_process_is_killed_and_reported() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let mut p = Fake::new(0, true);

        let started = Instant::now();
        let out = teardown(&mut p, Duration::from_secs(5), &bus, "cam1").await;

        assert_eq!(out, StopOutcome::Forced);
        assert!(p.killed);
        assert!(started.elapsed() >= Duration::from_secs(5));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ForceKilled);
        assert_eq!(ev.pid, Some(7));
    }

    #[tokio::test]
    async fn test_dead_process_is_left_alone() {
        let mut p = Fake::new(0, false);
        p.alive = false;
        assert_eq!(
            stop_process(&mut p, Duration::from_secs(5)).await,
            StopOutcome::Exited
        );
        assert!(!p.stop_requested);
    }
}
