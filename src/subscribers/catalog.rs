//! # CatalogWriter: mirrors worker events into the catalog.
//!
//! | event              | catalog call                                   |
//! |--------------------|------------------------------------------------|
//! | `WorkerRunning`    | `set_camera_status(id, Recording)`             |
//! | `BackoffScheduled` | `set_camera_status(id, Reconnecting)`          |
//! | `WorkerFailed`     | `set_camera_status(id, Failed)`                |
//! | `WorkerStopped`    | `set_camera_status(id, Stopped)`               |
//! | `SegmentCompleted` | `record_completed_segment(id, file, q, size)`  |
//!
//! Catalog errors are logged and dropped; a catalog outage never reaches a worker.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::catalog::{CameraStatus, ConnectivityGuard, SegmentRecord};
use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

pub struct CatalogWriter {
    guard: Arc<ConnectivityGuard>,
    quality: String,
}

impl CatalogWriter {
    /// `quality` is the label stored with every segment.
    pub fn new(guard: Arc<ConnectivityGuard>, quality: impl Into<String>) -> Self {
        Self {
            guard,
            quality: quality.into(),
        }
    }

    fn status_for(kind: EventKind) -> Option<CameraStatus> {
        match kind {
            EventKind::WorkerRunning => Some(CameraStatus::Recording),
            EventKind::BackoffScheduled => Some(CameraStatus::Reconnecting),
            EventKind::WorkerFailed => Some(CameraStatus::Failed),
            EventKind::WorkerStopped => Some(CameraStatus::Stopped),
            _ => None,
        }
    }

    fn segment_for(&self, camera: &str, e: &Event) -> Option<SegmentRecord> {
        let path = e.path.as_ref()?;
        let filename = path.file_name()?.to_string_lossy().into_owned();
        Some(SegmentRecord {
            camera_id: camera.to_string(),
            filename,
            quality: self.quality.clone(),
            size_bytes: e.bytes.unwrap_or(0),
        })
    }
}

#[async_trait]
impl Subscribe for CatalogWriter {
    async fn on_event(&self, e: &Event) {
        let Some(camera) = e.worker.as_deref() else {
            return;
        };

        if let Some(status) = Self::status_for(e.kind) {
            if let Err(err) = self.guard.set_camera_status(camera, status).await {
                warn!(camera, %status, error = %err, label = err.as_label(), "catalog status update failed");
            }
            return;
        }

        if e.kind == EventKind::SegmentCompleted {
            if let Some(segment) = self.segment_for(camera, e) {
                if let Err(err) = self.guard.record_completed_segment(&segment).await {
                    warn!(
                        camera,
                        file = %segment.filename,
                        error = %err,
                        label = err.as_label(),
                        "catalog segment insert failed"
                    );
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "catalog"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}
