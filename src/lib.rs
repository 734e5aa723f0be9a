//! # camvisor
//!
//! **Camvisor** supervises a fleet of long-running camera recording processes.
//!
//! Every camera gets a supervision loop that launches an external segmenting
//! recorder, watches it, and restarts it with backoff when it dies. The fleet
//! shares a bounded pool of hardware encoder slots, keeps the recording volume
//! above a free-space floor, mirrors worker status into a catalog and reports
//! the health of the upstream streaming gateway.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!        ┌──────────────┐        ┌──────────────┐        ┌──────────────┐
//!        │   Catalog    │        │    Config    │        │ HealthProbe  │
//!        │ (roster, DB) │        │    (TOML)    │        │  (gateway)   │
//!        └──────┬───────┘        └──────┬───────┘        └──────┬───────┘
//!               ▼                       ▼                       ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │  Fleet (runtime orchestrator)                                         │
//! │  - ConnectivityGuard (reconnect + retry-once around catalog calls)    │
//! │  - ResourcePool      (encoder slots per class, RAII leases)           │
//! │  - RetentionEngine   (age cleanup, emergency eviction)                │
//! │  - Maintenance       (periodic pass, woken by space pressure)         │
//! │  - Registry          (workers by camera id, status channels)          │
//! └──────┬──────────────────┬──────────────────┬──────────────────┬───────┘
//!        ▼                  ▼                  ▼                  │
//!  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐          │
//!  │ WorkerActor │    │ WorkerActor │    │ WorkerActor │          │
//!  │  (camera 1) │    │  (camera 2) │    │  (camera N) │          │
//!  └──────┬──────┘    └──────┬──────┘    └──────┬──────┘          │
//!         │ WorkerRunning    │ BackoffScheduled │ SegmentCompleted│ CleanupCompleted
//!         ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                         Bus (broadcast channel)                       │
//! └──────────────────────────────────┬────────────────────────────────────┘
//!                                    ▼
//!                        ┌───────────────────────┐
//!                        │  subscriber_listener  │
//!                        └───────────┬───────────┘
//!                                    ▼
//!                              SubscriberSet
//!                     ┌──────────────┼──────────────┐
//!                     ▼              ▼              ▼
//!                 LogWriter    CatalogWriter    user subscribers
//! ```
//!
//! ### Worker lifecycle
//! ```text
//! Stopped ──► Starting ──► Running ──► Backoff ──► Starting ...
//!                │            │           │
//!                │            │           └─ failures ≥ max_retries ─► Failed
//!                │            └─ cancel ─► Stopped
//!                └─ launch error ─► Backoff
//!
//! Starting waits (uncounted) for free space ≥ floor and a free encoder slot.
//! Backoff delay: retry_delay for failures 1..=3, retry_delay × 2 afterwards.
//! ```
//!
//! ## Features
//! | Area            | Description                                             | Key types                                   |
//! |-----------------|---------------------------------------------------------|---------------------------------------------|
//! | **Supervision** | Per-camera state machine, fleet start/stop/restart.     | [`Fleet`], [`WorkerState`], [`WorkerStatus`]|
//! | **Resources**   | Encoder slots with fallback across classes.             | [`ResourcePool`], [`Lease`]                 |
//! | **Storage**     | Age retention, emergency eviction, segment tracking.    | [`RetentionEngine`], [`Maintenance`]        |
//! | **Processes**   | Launch seam over external recorders.                    | [`Launcher`], [`ProcessHandle`]             |
//! | **Catalog**     | Roster source and status sink with reconnect.           | [`Catalog`], [`ConnectivityGuard`]          |
//! | **Gateway**     | Cached gateway health; gates the live output.           | [`DependencyHealthMonitor`]                 |
//! | **Events**      | Lifecycle events fanned out to subscribers.             | [`Event`], [`Subscribe`]                    |
//! | **Errors**      | Typed errors for workers, runtime and collaborators.    | [`WorkerError`], [`RuntimeError`]           |
//!
//! ## Example
//! ```rust,no_run
//! use camvisor::{Config, Fleet};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = Config::load("/etc/camvisor.toml")?;
//!     let fleet = Fleet::builder(cfg).build()?;
//!     fleet.run().await?;
//!     Ok(())
//! }
//! ```
pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod gateway;
pub mod policies;
pub mod process;
pub mod resources;
pub mod storage;
pub mod subscribers;

#[cfg(test)]
mod testkit;

// ---- Public re-exports ----

pub use crate::core::{
    CameraWorker, Fleet, FleetBuilder, WorkerExit, WorkerOutcome, WorkerState, WorkerStatus,
};
pub use catalog::{
    CameraRecord, CameraStatus, Catalog, ConnectivityGuard, SegmentRecord, StaticCatalog,
};
pub use config::Config;
pub use error::{AllocError, CatalogError, ConfigError, GatewayError, RuntimeError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use gateway::{DependencyHealthMonitor, HealthProbe, HttpProbe};
pub use policies::{BackoffPolicy, JitterPolicy, RetryDecision, RetryPolicy};
pub use process::{ChildLauncher, CommandSpec, Launcher, ProcessHandle, RecordingCommand};
pub use resources::{Lease, ResourceClass, ResourcePool};
pub use storage::{DiskStats, Maintenance, RetentionEngine, RetentionPolicy, SpaceProbe};
pub use subscribers::{Subscribe, SubscriberSet};
