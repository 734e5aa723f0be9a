//! Error types used by the camvisor runtime, its workers and collaborators.
//!
//! This module defines the error taxonomy of the fleet:
//!
//! - [`WorkerError`]: failures observed by a single camera worker.
//! - [`AllocError`]: the resource allocator had no free slot.
//! - [`CatalogError`]: the catalog collaborator could not serve a call.
//! - [`GatewayError`]: the streaming gateway probe failed.
//! - [`ConfigError`]: configuration could not be loaded or is inconsistent.
//! - [`RuntimeError`]: errors raised by the fleet runtime itself.
//!
//! Every enum provides `as_label` (a short stable snake_case label for logs/metrics).
//! [`WorkerError::counts_toward_retry_budget`] encodes which failures accumulate
//! toward the permanent `Failed` state.

use std::path::PathBuf;

use thiserror::Error;

/// # Errors observed by a camera worker.
///
/// Only [`WorkerError::LaunchFailure`] and [`WorkerError::UnexpectedExit`] are counted
/// against the retry budget. Resource and space exhaustion are waited out and never
/// escalate to a permanent failure.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The external process could not be started.
    #[error("launch failed: {reason}")]
    LaunchFailure {
        /// Underlying cause.
        reason: String,
    },

    /// The external process started and then died.
    #[error("process exited unexpectedly: {status}")]
    UnexpectedExit {
        /// Exit status as reported by the process handle.
        status: String,
    },

    /// No allocator slot was available in any resource class.
    #[error("no hardware encoder slot available")]
    ResourceExhausted,

    /// Free space on the recording volume is below the configured floor.
    #[error("free space {free_gb}GB below floor {min_gb}GB")]
    SpaceExhausted {
        /// Free space observed, in whole GB.
        free_gb: u64,
        /// Configured floor, in whole GB.
        min_gb: u64,
    },
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use camvisor::WorkerError;
    ///
    /// let err = WorkerError::ResourceExhausted;
    /// assert_eq!(err.as_label(), "resource_exhausted");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::LaunchFailure { .. } => "launch_failure",
            WorkerError::UnexpectedExit { .. } => "unexpected_exit",
            WorkerError::ResourceExhausted => "resource_exhausted",
            WorkerError::SpaceExhausted { .. } => "space_exhausted",
        }
    }

    /// Indicates whether the error accumulates toward the permanent `Failed` state.
    ///
    /// # Example
    /// ```
    /// use camvisor::WorkerError;
    ///
    /// let crash = WorkerError::UnexpectedExit { status: "exit status: 1".into() };
    /// assert!(crash.counts_toward_retry_budget());
    ///
    /// let full = WorkerError::SpaceExhausted { free_gb: 3, min_gb: 10 };
    /// assert!(!full.counts_toward_retry_budget());
    /// ```
    pub fn counts_toward_retry_budget(&self) -> bool {
        matches!(
            self,
            WorkerError::LaunchFailure { .. } | WorkerError::UnexpectedExit { .. }
        )
    }
}

/// Error returned by [`ResourcePool::acquire`](crate::ResourcePool::acquire).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// Every resource class is at capacity; the caller waits and retries.
    #[error("all resource classes at capacity (preferred: {preferred})")]
    Exhausted {
        /// The class the caller asked for first.
        preferred: String,
    },
}

/// # Errors produced by the catalog collaborator.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The catalog could not be reached (connection lost or refused).
    #[error("catalog unavailable: {reason}")]
    Unavailable {
        /// Underlying cause.
        reason: String,
    },

    /// The catalog was reachable but rejected the operation.
    #[error("catalog query failed: {reason}")]
    Query {
        /// Underlying cause.
        reason: String,
    },
}

impl CatalogError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CatalogError::Unavailable { .. } => "catalog_unavailable",
            CatalogError::Query { .. } => "catalog_query_failed",
        }
    }

    /// Connection-level failures are the only ones a reconnect can fix.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, CatalogError::Unavailable { .. })
    }
}

/// # Errors produced by the streaming-gateway health probe.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway answered with a non-success status.
    #[error("gateway unhealthy: HTTP {status}")]
    Unhealthy {
        /// HTTP status code returned.
        status: u16,
    },

    /// The request could not complete (connect error, timeout).
    #[error("gateway request failed: {reason}")]
    Request {
        /// Underlying cause.
        reason: String,
    },
}

impl GatewayError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            GatewayError::Unhealthy { .. } => "gateway_unhealthy",
            GatewayError::Request { .. } => "gateway_request_failed",
        }
    }
}

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config {path:?}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`Config`](crate::Config).
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but violates a constraint.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// # Errors produced by the fleet runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The catalog returned no active cameras.
    #[error("no active cameras in catalog")]
    NoCameras,

    /// Free space stayed below the floor even after emergency eviction.
    #[error("insufficient disk space: {free_gb}GB free, {min_gb}GB required")]
    InsufficientSpace {
        /// Free space after eviction, in whole GB.
        free_gb: u64,
        /// Configured floor, in whole GB.
        min_gb: u64,
    },

    /// One or more worker tasks panicked; their slots were released by the lease guard.
    #[error("worker tasks panicked: {workers:?}")]
    WorkerPanicked {
        /// Camera ids of the panicked workers.
        workers: Vec<String>,
    },

    /// Shutdown signal listeners could not be installed.
    #[error("signal handling failed: {0}")]
    Signal(#[from] std::io::Error),

    /// Initial roster load failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NoCameras => "runtime_no_cameras",
            RuntimeError::InsufficientSpace { .. } => "runtime_insufficient_space",
            RuntimeError::WorkerPanicked { .. } => "runtime_worker_panicked",
            RuntimeError::Signal(_) => "runtime_signal",
            RuntimeError::Catalog(_) => "runtime_catalog",
        }
    }
}
