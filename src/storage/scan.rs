//! Recursive discovery of recording files.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;
use walkdir::WalkDir;

/// One recording found on disk. Never cached across passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// Lists regular files under `root` whose extension equals `extension`.
///
/// Entries that vanish or cannot be stat'ed mid-walk are skipped; a missing
/// root yields an empty list.
pub fn scan_recordings(root: &Path, extension: &str) -> Vec<RecordingFile> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!(root = %root.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                debug!(path = %entry.path().display(), error = %err, "file vanished during scan");
                continue;
            }
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        files.push(RecordingFile {
            path: entry.into_path(),
            modified,
            size: meta.len(),
        });
    }
    files
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_scan_is_recursive_and_filters_extension() {
        let dir = tempfile::tempdir().unwrap();
        let cam = dir.path().join("Lobby");
        fs::create_dir_all(cam.join("nested")).unwrap();
        fs::write(cam.join("a.mp4"), b"aa").unwrap();
        fs::write(cam.join("nested/b.mp4"), b"bbb").unwrap();
        fs::write(cam.join("Lobby_ffmpeg.log"), b"log").unwrap();
        fs::write(dir.path().join("c.mkv"), b"c").unwrap();

        let mut found = scan_recordings(dir.path(), "mp4");
        found.sort_by_key(|f| f.size);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].size, 2);
        assert!(found[1].path.ends_with("nested/b.mp4"));
    }

    #[test]
    fn test_missing_root_is_empty() {
        assert!(scan_recordings(Path::new("/no/such/root"), "mp4").is_empty());
    }
}
