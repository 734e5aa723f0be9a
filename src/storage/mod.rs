//! # Recording volume: free space, retention and segment discovery.
//!
//! - [`SpaceProbe`] reads volume statistics ([`StatvfsProbe`] in production).
//! - [`RetentionEngine`] answers `has_enough_space` for worker admission and
//!   performs age-based cleanup and oldest-first emergency eviction.
//! - [`Maintenance`] runs the engine on its own schedule and on space-pressure signals.
//! - [`SegmentTracker`] discovers recording segments the encoder has finished.
//!
//! Files are re-scanned on every pass; nothing is cached between passes.

mod maintenance;
mod retention;
mod scan;
mod segments;
mod space;

pub use maintenance::{Maintenance, PassReport};
pub use retention::{CleanupReport, EvictionReport, RetentionEngine, RetentionPolicy};
pub use scan::{scan_recordings, RecordingFile};
pub use segments::SegmentTracker;
pub use space::{DiskStats, SpaceProbe, StatvfsProbe, GIB};
