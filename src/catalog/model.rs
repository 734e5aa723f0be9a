//! Records exchanged with the catalog.

use std::fmt;

use serde::Deserialize;

/// One camera row as listed by the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraRecord {
    /// Stable identifier.
    pub id: String,
    /// Display name; also names the recording directory.
    pub name: String,
    /// Stream address the encoder reads from.
    pub source_address: String,
    #[serde(default)]
    pub location: String,
}

impl CameraRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source_address: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_address: source_address.into(),
            location: String::new(),
        }
    }
}

/// Status of a camera as persisted in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraStatus {
    Recording,
    Reconnecting,
    Failed,
    Stopped,
}

impl CameraStatus {
    /// Column value written to the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::Recording => "recording",
            CameraStatus::Reconnecting => "reconnecting",
            CameraStatus::Failed => "failed",
            CameraStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished recording segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentRecord {
    pub camera_id: String,
    /// File name relative to the camera directory.
    pub filename: String,
    pub quality: String,
    pub size_bytes: u64,
}
