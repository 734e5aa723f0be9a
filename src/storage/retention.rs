//! # Retention engine.
//!
//! Two passes police the recording root:
//!
//! - **scheduled cleanup**: delete every recording older than `retention_days`
//!   (disabled when `retention_days == 0`);
//! - **emergency eviction**: delete recordings oldest-first until free space
//!   reaches a target, re-reading free space before every deletion.
//!
//! A failed delete is logged and skipped. A file that vanished before it could be
//! deleted is not an error: a concurrent writer or another pass already removed it.
//!
//! All methods block on the filesystem; async callers go through
//! [`Maintenance`](super::Maintenance), which uses `spawn_blocking`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info, warn};

use super::scan::{scan_recordings, RecordingFile};
use super::space::{DiskStats, SpaceProbe, GIB};
use crate::config::Config;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Usage above this share of the volume is logged as a warning.
const HIGH_USAGE_PERCENT: u8 = 90;

/// Age and free-space limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Recordings older than this many days are deleted. `0` disables age cleanup.
    pub retention_days: u32,
    /// New recordings are refused below this much free space.
    pub min_free_space_gb: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_days: 2,
            min_free_space_gb: 10,
        }
    }
}

/// Result of [`RetentionEngine::scheduled_cleanup`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failed: usize,
    pub freed_bytes: u64,
}

/// Result of [`RetentionEngine::emergency_eviction`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub target_gb: u64,
    pub deleted: usize,
    pub freed_bytes: u64,
    /// Free space when the pass ended.
    pub free_gb: u64,
}

impl EvictionReport {
    pub fn freed_gb(&self) -> u64 {
        self.freed_bytes / GIB
    }

    pub fn reached_target(&self) -> bool {
        self.free_gb >= self.target_gb
    }
}

/// Retention policy enforcement over one recording root.
pub struct RetentionEngine {
    root: PathBuf,
    extension: String,
    policy: RetentionPolicy,
    probe: Arc<dyn SpaceProbe>,
}

impl RetentionEngine {
    pub fn new(
        root: impl Into<PathBuf>,
        extension: impl Into<String>,
        policy: RetentionPolicy,
        probe: Arc<dyn SpaceProbe>,
    ) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            policy,
            probe,
        }
    }

    pub fn from_config(cfg: &Config, probe: Arc<dyn SpaceProbe>) -> Self {
        Self::new(
            cfg.recording_root.clone(),
            cfg.recording_extension.clone(),
            cfg.retention_policy(),
            probe,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    fn stats(&self) -> io::Result<DiskStats> {
        self.probe.stats(&self.root)
    }

    /// Free space in whole GB; `0` when the volume cannot be read.
    pub fn free_space_gb(&self) -> u64 {
        match self.stats() {
            Ok(st) => st.free_gb(),
            Err(err) => {
                error!(root = %self.root.display(), error = %err, "cannot read disk stats");
                0
            }
        }
    }

    /// Used share of the volume; `100` when the volume cannot be read.
    pub fn disk_usage_percent(&self) -> u8 {
        self.stats().map(|st| st.usage_percent()).unwrap_or(100)
    }

    /// Admission predicate: free space is at least the configured floor.
    pub fn has_enough_space(&self) -> bool {
        let free_gb = self.free_space_gb();
        let min_gb = self.policy.min_free_space_gb;
        if free_gb < min_gb {
            error!(free_gb, min_gb, "disk space critical");
            return false;
        }
        let usage = self.disk_usage_percent();
        if usage > HIGH_USAGE_PERCENT {
            warn!(usage_percent = usage, "disk usage high");
        }
        true
    }

    /// Deletes recordings older than the retention window, relative to now.
    pub fn scheduled_cleanup(&self) -> CleanupReport {
        self.scheduled_cleanup_at(SystemTime::now())
    }

    /// Deletes recordings whose modification time is before `now − retention_days`.
    pub fn scheduled_cleanup_at(&self, now: SystemTime) -> CleanupReport {
        let mut report = CleanupReport::default();
        if self.policy.retention_days == 0 {
            debug!("retention cleanup disabled");
            return report;
        }
        let window = Duration::from_secs(u64::from(self.policy.retention_days) * SECS_PER_DAY);
        let Some(cutoff) = now.checked_sub(window) else {
            return report;
        };

        let expired: Vec<RecordingFile> = scan_recordings(&self.root, &self.extension)
            .into_iter()
            .filter(|f| f.modified < cutoff)
            .collect();
        if expired.is_empty() {
            debug!("no expired recordings");
            return report;
        }

        info!(
            files = expired.len(),
            mb = expired.iter().map(|f| f.size).sum::<u64>() / (1024 * 1024),
            "cleaning up expired recordings"
        );
        for file in &expired {
            match remove(&file.path) {
                Ok(true) => {
                    report.deleted += 1;
                    report.freed_bytes += file.size;
                    debug!(path = %file.path.display(), "deleted expired recording");
                }
                Ok(false) => {}
                Err(err) => {
                    report.failed += 1;
                    error!(path = %file.path.display(), error = %err, "failed to delete recording");
                }
            }
        }
        info!(
            deleted = report.deleted,
            failed = report.failed,
            freed_gb = report.freed_bytes / GIB,
            "cleanup completed"
        );
        report
    }

    /// Deletes recordings oldest-first until free space reaches `target_gb`.
    ///
    /// Free space is re-read before every deletion, so no file is deleted once the
    /// target is met. The pass also stops once the bytes freed alone cover the target,
    /// which bounds the damage when the probe lags behind deletions.
    pub fn emergency_eviction(&self, target_gb: u64) -> EvictionReport {
        warn!(target_gb, "emergency eviction triggered");
        let mut report = EvictionReport {
            target_gb,
            ..EvictionReport::default()
        };
        let target_bytes = target_gb.saturating_mul(GIB);

        let mut candidates = scan_recordings(&self.root, &self.extension);
        candidates.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

        for file in &candidates {
            if self.free_space_gb() >= target_gb {
                break;
            }
            match remove(&file.path) {
                Ok(true) => {
                    report.deleted += 1;
                    report.freed_bytes += file.size;
                    info!(
                        path = %file.path.display(),
                        mb = file.size / (1024 * 1024),
                        "emergency deleted"
                    );
                }
                Ok(false) => {}
                Err(err) => {
                    error!(path = %file.path.display(), error = %err, "failed to delete recording");
                }
            }
            if report.freed_bytes >= target_bytes {
                break;
            }
        }

        report.free_gb = self.free_space_gb();
        warn!(
            deleted = report.deleted,
            freed_gb = report.freed_gb(),
            free_gb = report.free_gb,
            "emergency eviction finished"
        );
        report
    }

    /// Logs total/used/free space, usage and the policy.
    pub fn log_storage_info(&self) {
        let st = match self.stats() {
            Ok(st) => st,
            Err(err) => {
                error!(root = %self.root.display(), error = %err, "cannot get storage info");
                return;
            }
        };
        info!(
            path = %self.root.display(),
            total_gb = st.total_gb(),
            used_gb = st.used_gb(),
            free_gb = st.free_gb(),
            usage_percent = st.usage_percent(),
            retention_days = self.policy.retention_days,
            min_free_gb = self.policy.min_free_space_gb,
            "storage info"
        );
    }
}

/// Removes `path`; `Ok(false)` when it was already gone.
fn remove(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "file vanished before delete");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;

    /// Volume of fixed size whose usage is the size of the files under `root`.
    struct DirVolume {
        root: PathBuf,
        capacity: u64,
    }

    impl SpaceProbe for DirVolume {
        fn stats(&self, _path: &Path) -> io::Result<DiskStats> {
            let used: u64 = scan_recordings(&self.root, "mp4").iter().map(|f| f.size).sum();
            Ok(DiskStats {
                total_bytes: self.capacity,
                free_bytes: self.capacity.saturating_sub(used),
                used_bytes: used,
            })
        }
    }

    struct FixedFree(u64);

    impl SpaceProbe for FixedFree {
        fn stats(&self, _path: &Path) -> io::Result<DiskStats> {
            Ok(DiskStats {
                total_bytes: 100 * GIB,
                free_bytes: self.0 * GIB,
                used_bytes: (100 - self.0) * GIB,
            })
        }
    }

    struct Broken;

    impl SpaceProbe for Broken {
        fn stats(&self, _path: &Path) -> io::Result<DiskStats> {
            Err(io::Error::new(io::ErrorKind::Other, "no volume"))
        }
    }

    fn recording(root: &Path, name: &str, size: u64, modified: SystemTime) -> PathBuf {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let f = File::create(&path).unwrap();
        f.set_len(size).unwrap();
        f.set_modified(modified).unwrap();
        path
    }

    fn engine(root: &Path, days: u32, min_gb: u64, probe: Arc<dyn SpaceProbe>) -> RetentionEngine {
        RetentionEngine::new(
            root,
            "mp4",
            RetentionPolicy {
                retention_days: days,
                min_free_space_gb: min_gb,
            },
            probe,
        )
    }

    const DAY: Duration = Duration::from_secs(SECS_PER_DAY);

    #[test]
    fn test_has_enough_space_against_floor() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!engine(dir.path(), 2, 10, Arc::new(FixedFree(5))).has_enough_space());
        assert!(engine(dir.path(), 2, 10, Arc::new(FixedFree(15))).has_enough_space());
        assert!(engine(dir.path(), 2, 10, Arc::new(FixedFree(10))).has_enough_space());
    }

    #[test]
    fn test_probe_error_reads_as_no_space() {
        let dir = tempfile::tempdir().unwrap();
        let e = engine(dir.path(), 2, 10, Arc::new(Broken));
        assert_eq!(e.free_space_gb(), 0);
        assert_eq!(e.disk_usage_percent(), 100);
        assert!(!e.has_enough_space());
    }

    #[test]
    fn test_cleanup_respects_retention_window() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let old = recording(dir.path(), "Lobby/old.mp4", 10, now - 3 * DAY);
        let fresh = recording(dir.path(), "Lobby/fresh.mp4", 10, now - DAY);
        let log = dir.path().join("Lobby/Lobby_ffmpeg.log");
        fs::write(&log, b"x").unwrap();
        File::options()
            .write(true)
            .open(&log)
            .unwrap()
            .set_modified(now - 10 * DAY)
            .unwrap();

        let report = engine(dir.path(), 2, 10, Arc::new(FixedFree(50))).scheduled_cleanup_at(now);

        assert_eq!(report.deleted, 1);
        assert_eq!(report.freed_bytes, 10);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(log.exists());
    }

    #[test]
    fn test_cleanup_disabled_with_zero_days() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let old = recording(dir.path(), "a/old.mp4", 1, now - 100 * DAY);
        let report = engine(dir.path(), 0, 10, Arc::new(FixedFree(50))).scheduled_cleanup_at(now);
        assert_eq!(report, CleanupReport::default());
        assert!(old.exists());
    }

    #[test]
    fn test_eviction_is_oldest_first_and_minimal() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        // 20 GB volume holding 16 GB of recordings: 4 GB free.
        let oldest = recording(dir.path(), "b/1.mp4", 4 * GIB, now - 4 * DAY);
        let older = recording(dir.path(), "a/2.mp4", 4 * GIB, now - 3 * DAY);
        let newer = recording(dir.path(), "b/3.mp4", 4 * GIB, now - 2 * DAY);
        let newest = recording(dir.path(), "a/4.mp4", 4 * GIB, now - DAY);
        let probe = Arc::new(DirVolume {
            root: dir.path().to_path_buf(),
            capacity: 20 * GIB,
        });

        let report = engine(dir.path(), 2, 10, probe).emergency_eviction(11);

        // 4 → 8 → 12 GB: two deletions cross the target.
        assert_eq!(report.deleted, 2);
        assert_eq!(report.freed_bytes, 8 * GIB);
        assert_eq!(report.free_gb, 12);
        assert!(report.reached_target());
        assert!(!oldest.exists());
        assert!(!older.exists());
        assert!(newer.exists());
        assert!(newest.exists());
    }

    #[test]
    fn test_eviction_noop_when_target_met() {
        let dir = tempfile::tempdir().unwrap();
        let f = recording(dir.path(), "a/1.mp4", GIB, SystemTime::now() - DAY);
        let report = engine(dir.path(), 2, 10, Arc::new(FixedFree(30))).emergency_eviction(20);
        assert_eq!(report.deleted, 0);
        assert!(f.exists());
    }

    #[test]
    fn test_eviction_exhausts_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let probe = Arc::new(DirVolume {
            root: dir.path().to_path_buf(),
            capacity: 10 * GIB,
        });
        recording(dir.path(), "a/1.mp4", GIB, SystemTime::now() - DAY);
        let report = engine(dir.path(), 2, 10, probe).emergency_eviction(50);
        assert_eq!(report.deleted, 1);
        assert!(!report.reached_target());
    }
}
