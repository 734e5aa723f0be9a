//! # Process-wide configuration.
//!
//! [`Config`] centralizes every tunable of the fleet runtime. It is read once at
//! startup (see [`Config::load`]) and never reconfigured at runtime.
//!
//! Config is used in three ways:
//! 1. **Fleet creation**: `Fleet::builder(config)`
//! 2. **Worker policies**: [`Config::retry_policy`] / [`Config::retention_policy`]
//! 3. **Collaborators**: [`GatewayConfig`] / [`CatalogConfig`] / [`SegmentConfig`]
//!
//! ## File format
//! TOML; every key is optional and falls back to [`Config::default`]. Durations are
//! written as whole seconds.
//! ```toml
//! recording_root = "/data/recordings"
//! retention_days = 7
//! retry_delay = 5
//!
//! [[resource_classes]]
//! name = "nvenc"
//! capacity = 6
//! encoder = "nvenc"
//!
//! [[cameras]]
//! id = "cam001"
//! name = "Front Door"
//! source_address = "rtsp://10.0.0.21/stream1"
//! ```
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use camvisor::Config;
//!
//! let cfg = Config::from_toml_str("retention_days = 7\nretry_delay = 3").unwrap();
//! assert_eq!(cfg.retention_days, 7);
//! assert_eq!(cfg.retry_delay, Duration::from_secs(3));
//! assert_eq!(cfg.min_free_space_gb, 10);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::catalog::CameraRecord;
use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, JitterPolicy, RetryPolicy};
use crate::process::{segment_format, EncoderFamily};
use crate::storage::RetentionPolicy;

/// Global configuration for the fleet runtime.
///
/// ## Field semantics
/// - `retention_days`: age-based cleanup horizon (`0` = disabled)
/// - `min_free_space_gb`: floor below which no new recording is launched
/// - `max_retries`: consecutive counted failures before a worker is `Failed`
/// - `retry_delay`: base backoff delay (doubled after the third failure)
/// - `poll_interval`: process liveness poll period
/// - `admission_wait`: wait between admission checks when space/slots are exhausted
/// - `stop_grace`: cooperative stop window before a process is force-killed
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root directory of all recordings (one sub-directory per camera).
    pub recording_root: PathBuf,
    /// File extension of recording segments eligible for retention.
    pub recording_extension: String,

    /// Age-based retention horizon in days (`0` disables scheduled cleanup).
    pub retention_days: u32,
    /// Minimum free space (GB) required before any (re)launch.
    pub min_free_space_gb: u64,
    /// Period of the scheduled retention pass.
    #[serde(deserialize_with = "secs::deserialize")]
    pub cleanup_interval: Duration,
    /// Extra free space (GB above the floor) targeted by scheduled emergency eviction.
    pub emergency_headroom_gb: u64,
    /// Extra free space (GB above the floor) targeted by the startup preflight.
    pub startup_headroom_gb: u64,

    /// Consecutive counted failures before a worker is marked `Failed`.
    pub max_retries: u32,
    /// Base retry delay.
    #[serde(deserialize_with = "secs::deserialize")]
    pub retry_delay: Duration,
    /// Randomization applied to retry delays.
    pub retry_jitter: JitterPolicy,
    /// Period of the liveness poll while a process runs.
    #[serde(deserialize_with = "secs::deserialize")]
    pub poll_interval: Duration,
    /// Period of the free-space re-check (and segment scan) while a process runs.
    #[serde(deserialize_with = "secs::deserialize")]
    pub space_check_interval: Duration,
    /// Wait between admission checks while space or encoder slots are exhausted.
    #[serde(deserialize_with = "secs::deserialize")]
    pub admission_wait: Duration,
    /// Cooperative stop window before a process is force-killed.
    #[serde(deserialize_with = "secs::deserialize")]
    pub stop_grace: Duration,
    /// Period of the fleet status report.
    #[serde(deserialize_with = "secs::deserialize")]
    pub status_interval: Duration,

    /// Capacity of the event bus ring buffer (min 1).
    pub bus_capacity: usize,

    /// Hardware encoder classes in priority order.
    pub resource_classes: Vec<ResourceClassConfig>,
    /// Transcoding process settings.
    pub segment: SegmentConfig,
    /// Streaming gateway health settings.
    pub gateway: GatewayConfig,
    /// Catalog connectivity settings.
    pub catalog: CatalogConfig,
    /// Static camera roster served by [`StaticCatalog`](crate::StaticCatalog).
    pub cameras: Vec<CameraRecord>,
}

/// One hardware-encoder resource class.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResourceClassConfig {
    /// Class name used in logs and status reports.
    pub name: String,
    /// Maximum number of workers holding this class at once.
    pub capacity: usize,
    /// Encoder family selected in the command line for this class.
    pub encoder: EncoderFamily,
}

/// Settings for the external transcoding process.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentConfig {
    /// Executable to spawn.
    pub program: String,
    /// Length of one recording segment.
    #[serde(deserialize_with = "secs::deserialize")]
    pub segment_time: Duration,
    /// Window after spawn during which an early exit counts as a launch failure.
    #[serde(deserialize_with = "secs::deserialize")]
    pub startup_probe: Duration,
    /// Quality label recorded in the catalog for completed segments.
    pub quality: String,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            segment_time: Duration::from_secs(180),
            startup_probe: Duration::from_secs(2),
            quality: "original".to_string(),
        }
    }
}

/// Settings for the streaming gateway: health monitor and live publishing.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the gateway API.
    pub url: String,
    /// RTSP publish URL of the live output; `{camera}` is replaced by the camera id.
    /// Empty disables live publishing.
    pub publish_url: String,
    /// Minimum time between two probes (cached result in between).
    #[serde(deserialize_with = "secs::deserialize")]
    pub check_interval: Duration,
    /// Per-probe HTTP timeout.
    #[serde(deserialize_with = "secs::deserialize")]
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9997".to_string(),
            publish_url: "rtsp://localhost:8554/live/{camera}/high".to_string(),
            check_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Settings for the catalog connectivity guard.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Connection attempts per reconnect cycle.
    pub connect_attempts: u32,
    /// Base delay of the linear reconnect backoff.
    #[serde(deserialize_with = "secs::deserialize")]
    pub connect_base_delay: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 5,
            connect_base_delay: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resource_classes.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one resource class is required".into(),
            ));
        }
        let mut seen = HashSet::new();
        for class in &self.resource_classes {
            if class.capacity == 0 {
                return Err(ConfigError::Invalid(format!(
                    "resource class {:?} has zero capacity",
                    class.name
                )));
            }
            if !seen.insert(class.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate resource class {:?}",
                    class.name
                )));
            }
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        for (key, value) in [
            ("poll_interval", self.poll_interval),
            ("admission_wait", self.admission_wait),
            ("space_check_interval", self.space_check_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{key} must be positive")));
            }
        }
        if segment_format(&self.recording_extension).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unsupported recording_extension {:?} (mp4, mov, mkv or ts)",
                self.recording_extension
            )));
        }
        Ok(())
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Retry policy derived from `max_retries` / `retry_delay` / `retry_jitter`.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: BackoffPolicy {
                base: self.retry_delay,
                jitter: self.retry_jitter,
                ..BackoffPolicy::default()
            },
        }
    }

    /// Retention policy shared by the retention engine and worker admission.
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            retention_days: self.retention_days,
            min_free_space_gb: self.min_free_space_gb,
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `retention_days = 2`, `min_free_space_gb = 10`, cleanup every hour
    /// - `max_retries = 10`, `retry_delay = 5s`, no jitter
    /// - liveness poll every 5s, free space re-checked every 5 min
    /// - `nvenc` (6 slots) preferred over `vaapi` (6 slots)
    fn default() -> Self {
        Self {
            recording_root: PathBuf::from("/data/recordings"),
            recording_extension: "mp4".to_string(),
            retention_days: 2,
            min_free_space_gb: 10,
            cleanup_interval: Duration::from_secs(3600),
            emergency_headroom_gb: 10,
            startup_headroom_gb: 20,
            max_retries: 10,
            retry_delay: Duration::from_secs(5),
            retry_jitter: JitterPolicy::None,
            poll_interval: Duration::from_secs(5),
            space_check_interval: Duration::from_secs(300),
            admission_wait: Duration::from_secs(30),
            stop_grace: Duration::from_secs(5),
            status_interval: Duration::from_secs(60),
            bus_capacity: 1024,
            resource_classes: vec![
                ResourceClassConfig {
                    name: "nvenc".to_string(),
                    capacity: 6,
                    encoder: EncoderFamily::Nvenc,
                },
                ResourceClassConfig {
                    name: "vaapi".to_string(),
                    capacity: 6,
                    encoder: EncoderFamily::Vaapi,
                },
            ],
            segment: SegmentConfig::default(),
            gateway: GatewayConfig::default(),
            catalog: CatalogConfig::default(),
            cameras: Vec::new(),
        }
    }
}

/// Durations as whole seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.retention_days, 2);
        assert_eq!(cfg.max_retries, 10);
        assert_eq!(cfg.resource_classes[0].name, "nvenc");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.retry_delay, Duration::from_secs(5));
        assert_eq!(cfg.gateway.url, "http://localhost:9997");
    }

    #[test]
    fn test_full_file() {
        let cfg = Config::from_toml_str(
            r#"
            recording_root = "/srv/rec"
            min_free_space_gb = 50
            retry_jitter = "equal"

            [[resource_classes]]
            name = "gpu"
            capacity = 2
            encoder = "nvenc"

            [gateway]
            url = "http://gw:9997"
            check_interval = 10

            [[cameras]]
            id = "cam1"
            name = "Lobby"
            source_address = "rtsp://cam1/stream"
            location = "Ground floor"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.recording_root, PathBuf::from("/srv/rec"));
        assert_eq!(cfg.min_free_space_gb, 50);
        assert_eq!(cfg.retry_jitter, JitterPolicy::Equal);
        assert_eq!(cfg.resource_classes.len(), 1);
        assert_eq!(cfg.gateway.check_interval, Duration::from_secs(10));
        assert_eq!(cfg.gateway.timeout, Duration::from_secs(5));
        assert_eq!(cfg.cameras[0].location, "Ground floor");
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(matches!(
            Config::from_toml_str("retention = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_inconsistent_classes() {
        let dup = r#"
            [[resource_classes]]
            name = "a"
            capacity = 1
            encoder = "copy"
            [[resource_classes]]
            name = "a"
            capacity = 1
            encoder = "copy"
        "#;
        assert!(matches!(
            Config::from_toml_str(dup),
            Err(ConfigError::Invalid(_))
        ));

        let zero = r#"
            [[resource_classes]]
            name = "a"
            capacity = 0
            encoder = "copy"
        "#;
        assert!(matches!(
            Config::from_toml_str(zero),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            Config::from_toml_str("resource_classes = []"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_zero_retries() {
        assert!(matches!(
            Config::from_toml_str("max_retries = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_zero_waits() {
        for key in ["poll_interval", "admission_wait", "space_check_interval"] {
            match Config::from_toml_str(&format!("{key} = 0")) {
                Err(ConfigError::Invalid(msg)) => assert!(msg.starts_with(key)),
                other => panic!("{key} = 0 accepted: {other:?}"),
            }
        }
    }

    #[test]
    fn test_recording_extension_must_have_a_muxer() {
        assert!(Config::from_toml_str(r#"recording_extension = "mkv""#).is_ok());
        assert!(matches!(
            Config::from_toml_str(r#"recording_extension = "avi""#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_live_publish_can_be_disabled() {
        let cfg = Config::from_toml_str("[gateway]\npublish_url = \"\"").unwrap();
        assert!(cfg.gateway.publish_url.is_empty());
        assert!(Config::default().gateway.publish_url.contains("{camera}"));
    }

    #[test]
    fn test_derived_policies() {
        let cfg = Config::default();
        let retry = cfg.retry_policy();
        assert_eq!(retry.max_retries, 10);
        assert_eq!(retry.backoff.base, Duration::from_secs(5));

        let retention = cfg.retention_policy();
        assert_eq!(retention.retention_days, 2);
        assert_eq!(retention.min_free_space_gb, 10);
    }
}
