//! Volume statistics.

use std::io;
use std::path::Path;

use nix::sys::statvfs::statvfs;

/// Bytes per GB as used for every space figure (binary gigabyte).
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Snapshot of one volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiskStats {
    pub total_bytes: u64,
    /// Space available to unprivileged writers.
    pub free_bytes: u64,
    pub used_bytes: u64,
}

impl DiskStats {
    /// Free space in whole GB (rounded down).
    pub fn free_gb(&self) -> u64 {
        self.free_bytes / GIB
    }

    pub fn total_gb(&self) -> u64 {
        self.total_bytes / GIB
    }

    pub fn used_gb(&self) -> u64 {
        self.used_bytes / GIB
    }

    /// Used share of the volume, 0-100. An empty volume reads as full.
    pub fn usage_percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let pct = u128::from(self.used_bytes) * 100 / u128::from(self.total_bytes);
        pct.min(100) as u8
    }
}

/// Source of volume statistics.
pub trait SpaceProbe: Send + Sync + 'static {
    fn stats(&self, path: &Path) -> io::Result<DiskStats>;
}

/// `statvfs(2)`-backed probe.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatvfsProbe;

impl SpaceProbe for StatvfsProbe {
    fn stats(&self, path: &Path) -> io::Result<DiskStats> {
        let st = statvfs(path).map_err(io::Error::from)?;
        let frsize = st.fragment_size() as u64;
        let blocks = st.blocks() as u64;
        let blocks_free = st.blocks_free() as u64;
        let blocks_avail = st.blocks_available() as u64;
        Ok(DiskStats {
            total_bytes: blocks.saturating_mul(frsize),
            free_bytes: blocks_avail.saturating_mul(frsize),
            used_bytes: blocks.saturating_sub(blocks_free).saturating_mul(frsize),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gb_rounds_down() {
        let st = DiskStats {
            total_bytes: 100 * GIB,
            free_bytes: 10 * GIB - 1,
            used_bytes: 90 * GIB,
        };
        assert_eq!(st.free_gb(), 9);
        assert_eq!(st.usage_percent(), 90);
    }

    #[test]
    fn test_empty_volume_reads_full() {
        assert_eq!(DiskStats::default().usage_percent(), 100);
    }

    #[test]
    fn test_statvfs_probe_on_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let st = StatvfsProbe.stats(dir.path()).unwrap();
        assert!(st.total_bytes >= st.free_bytes);
    }

    #[test]
    fn test_statvfs_probe_missing_path() {
        assert!(StatvfsProbe
            .stats(Path::new("/definitely/not/here"))
            .is_err());
    }
}
