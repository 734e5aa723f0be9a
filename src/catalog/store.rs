//! # Catalog trait and in-memory implementation.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CameraRecord, CameraStatus, SegmentRecord};
use crate::error::CatalogError;

/// Store listing cameras and recording metadata.
///
/// Implementations report lost connectivity as [`CatalogError::Unavailable`];
/// [`ConnectivityGuard`](super::ConnectivityGuard) reconnects on that error only.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    /// Opens (or re-opens) the connection.
    async fn connect(&self) -> Result<(), CatalogError>;

    /// Lightweight round trip.
    async fn ping(&self) -> Result<(), CatalogError>;

    /// Cameras that should be recorded.
    async fn list_active_cameras(&self) -> Result<Vec<CameraRecord>, CatalogError>;

    async fn set_camera_status(&self, id: &str, status: CameraStatus) -> Result<(), CatalogError>;

    async fn record_completed_segment(&self, segment: &SegmentRecord) -> Result<(), CatalogError>;
}

#[derive(Default)]
struct StaticState {
    connected: bool,
    statuses: HashMap<String, CameraStatus>,
    segments: Vec<SegmentRecord>,
    connect_failures: u32,
    injected: VecDeque<CatalogError>,
}

/// In-memory catalog seeded with a fixed roster.
///
/// Tests can inject failures: [`fail_next`](Self::fail_next) queues errors returned
/// by the next calls, and [`disconnect`](Self::disconnect) drops the connection
/// until `connect` succeeds again.
pub struct StaticCatalog {
    cameras: Vec<CameraRecord>,
    state: Mutex<StaticState>,
}

impl StaticCatalog {
    pub fn new(cameras: Vec<CameraRecord>) -> Self {
        Self {
            cameras,
            state: Mutex::new(StaticState {
                connected: true,
                ..StaticState::default()
            }),
        }
    }

    /// Queues an error returned by the next catalog call (connect excluded).
    pub fn fail_next(&self, err: CatalogError) {
        self.state.lock().injected.push_back(err);
    }

    /// Marks the connection as lost.
    pub fn disconnect(&self) {
        self.state.lock().connected = false;
    }

    /// Makes the next `n` connect attempts fail.
    pub fn fail_connects(&self, n: u32) {
        self.state.lock().connect_failures = n;
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Last status written for `id`.
    pub fn status_of(&self, id: &str) -> Option<CameraStatus> {
        self.state.lock().statuses.get(id).copied()
    }

    pub fn segments(&self) -> Vec<SegmentRecord> {
        self.state.lock().segments.clone()
    }

    fn check(state: &mut StaticState) -> Result<(), CatalogError> {
        if let Some(err) = state.injected.pop_front() {
            return Err(err);
        }
        if !state.connected {
            return Err(CatalogError::Unavailable {
                reason: "not connected".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn connect(&self) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(CatalogError::Unavailable {
                reason: "connection refused".into(),
            });
        }
        state.connected = true;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CatalogError> {
        let state = self.state.lock();
        if state.connected {
            Ok(())
        } else {
            Err(CatalogError::Unavailable {
                reason: "not connected".into(),
            })
        }
    }

    async fn list_active_cameras(&self) -> Result<Vec<CameraRecord>, CatalogError> {
        Self::check(&mut self.state.lock())?;
        Ok(self.cameras.clone())
    }

    async fn set_camera_status(&self, id: &str, status: CameraStatus) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        Self::check(&mut state)?;
        state.statuses.insert(id.to_string(), status);
        Ok(())
    }

    async fn record_completed_segment(&self, segment: &SegmentRecord) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        Self::check(&mut state)?;
        state.segments.push(segment.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_seeded_roster() {
        let catalog = StaticCatalog::new(vec![CameraRecord::new("c1", "Lobby", "rtsp://c1")]);
        let cams = catalog.list_active_cameras().await.unwrap();
        assert_eq!(cams.len(), 1);
        assert_eq!(cams[0].id, "c1");
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let catalog = StaticCatalog::new(Vec::new());
        catalog.fail_next(CatalogError::Query {
            reason: "syntax".into(),
        });
        assert!(catalog
            .set_camera_status("c1", CameraStatus::Recording)
            .await
            .is_err());
        catalog
            .set_camera_status("c1", CameraStatus::Recording)
            .await
            .unwrap();
        assert_eq!(catalog.status_of("c1"), Some(CameraStatus::Recording));
    }

    #[tokio::test]
    async fn test_disconnect_until_connect() {
        let catalog = StaticCatalog::new(Vec::new());
        catalog.disconnect();
        assert!(catalog.ping().await.is_err());
        catalog.fail_connects(1);
        assert!(catalog.connect().await.is_err());
        catalog.connect().await.unwrap();
        assert!(catalog.ping().await.is_ok());
    }
}
