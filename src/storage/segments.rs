//! Discovery of finished recording segments in one camera directory.
//!
//! The encoder always writes into the newest segment; every older segment is
//! closed. [`SegmentTracker::poll`] reports closed segments it has not reported
//! yet, tracked by a modification-time watermark.

use std::path::PathBuf;
use std::time::SystemTime;

use super::scan::{scan_recordings, RecordingFile};

pub struct SegmentTracker {
    dir: PathBuf,
    extension: String,
    watermark: SystemTime,
}

impl SegmentTracker {
    /// Tracks `dir`; segments last modified at or before `since` are never reported.
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>, since: SystemTime) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            watermark: since,
        }
    }

    /// Closed segments newer than the watermark, oldest first. The newest file is skipped.
    pub fn poll(&mut self) -> Vec<RecordingFile> {
        let mut files = self.unreported();
        files.pop();
        self.advance(&files);
        files
    }

    /// Every unreported segment, including the newest. Use once the encoder has stopped.
    pub fn flush(&mut self) -> Vec<RecordingFile> {
        let files = self.unreported();
        self.advance(&files);
        files
    }

    fn unreported(&self) -> Vec<RecordingFile> {
        let mut files: Vec<RecordingFile> = scan_recordings(&self.dir, &self.extension)
            .into_iter()
            .filter(|f| f.modified > self.watermark)
            .collect();
        files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        files
    }

    fn advance(&mut self, reported: &[RecordingFile]) {
        if let Some(last) = reported.last() {
            self.watermark = self.watermark.max(last.modified);
        }
    }
}
