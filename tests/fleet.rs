//! End-to-end fleet behaviour through the public API.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use camvisor::storage::GIB;
use camvisor::{
    CommandSpec, Config, DiskStats, Event, EventKind, Fleet, Launcher, ProcessHandle,
    SpaceProbe, StaticCatalog, Subscribe, WorkerError, WorkerState,
};

const CONFIG: &str = r#"
max_retries = 3
retry_delay = 5
poll_interval = 1
admission_wait = 30
stop_grace = 5

[[resource_classes]]
name = "nvenc"
capacity = 3
encoder = "nvenc"

[[resource_classes]]
name = "vaapi"
capacity = 2
encoder = "vaapi"

[[cameras]]
id = "c1"
name = "Front Door"
source_address = "rtsp://10.0.0.1/stream1"

[[cameras]]
id = "c2"
name = "Lobby"
source_address = "rtsp://10.0.0.2/stream1"

[[cameras]]
id = "c3"
name = "Garage"
source_address = "rtsp://10.0.0.3/stream1"

[[cameras]]
id = "c4"
name = "Yard"
source_address = "rtsp://10.0.0.4/stream1"

[[cameras]]
id = "c5"
name = "Dock"
source_address = "rtsp://10.0.0.5/stream1"
location = "warehouse"
"#;

/// Process that runs until SIGTERM.
struct Recorder {
    stop: Arc<AtomicBool>,
    exited: bool,
}

#[async_trait]
impl ProcessHandle for Recorder {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn is_alive(&mut self) -> bool {
        if self.stop.load(Ordering::SeqCst) {
            self.exited = true;
        }
        !self.exited
    }

    fn exit_status(&self) -> Option<String> {
        self.exited.then(|| "signal: 15 (SIGTERM)".to_string())
    }

    fn request_stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    async fn force_stop(&mut self) {
        self.exited = true;
    }
}

#[derive(Default)]
struct RecordingLauncher {
    stops: Mutex<Vec<Arc<AtomicBool>>>,
}

impl RecordingLauncher {
    fn launched(&self) -> usize {
        self.stops.lock().len()
    }

    fn signalled(&self) -> usize {
        self.stops
            .lock()
            .iter()
            .filter(|s| s.load(Ordering::SeqCst))
            .count()
    }
}

#[async_trait]
impl Launcher for RecordingLauncher {
    async fn launch(&self, spec: &CommandSpec) -> Result<Box<dyn ProcessHandle>, WorkerError> {
        assert!(spec.args.iter().any(|a| a.starts_with("rtsp://")));
        let stop = Arc::new(AtomicBool::new(false));
        self.stops.lock().push(Arc::clone(&stop));
        Ok(Box::new(Recorder {
            stop,
            exited: false,
        }))
    }
}

struct Roomy;

impl SpaceProbe for Roomy {
    fn stats(&self, _path: &Path) -> io::Result<DiskStats> {
        Ok(DiskStats {
            total_bytes: 500 * GIB,
            free_bytes: 200 * GIB,
            used_bytes: 300 * GIB,
        })
    }
}

#[derive(Default)]
struct RunningCounter(AtomicUsize);

#[async_trait]
impl Subscribe for RunningCounter {
    async fn on_event(&self, ev: &Event) {
        if ev.kind == EventKind::WorkerRunning {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &'static str {
        "running-counter"
    }
}

fn fleet(root: &Path) -> (Arc<Fleet>, Arc<RecordingLauncher>, Arc<RunningCounter>) {
    let mut cfg = Config::from_toml_str(CONFIG).unwrap();
    cfg.recording_root = root.to_path_buf();
    let launcher = Arc::new(RecordingLauncher::default());
    let counter = Arc::new(RunningCounter::default());
    let catalog = Arc::new(StaticCatalog::new(cfg.cameras.clone()));
    let fleet = Fleet::builder(cfg)
        .with_catalog(catalog)
        .with_launcher(launcher.clone())
        .with_space_probe(Arc::new(Roomy))
        .with_subscribers(vec![counter.clone() as Arc<dyn Subscribe>])
        .build()
        .unwrap();
    (fleet, launcher, counter)
}

async fn all_running(fleet: &Fleet) {
    for _ in 0..600 {
        if fleet
            .status_report()
            .iter()
            .all(|s| s.state == WorkerState::Running)
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("fleet never fully running: {:?}", fleet.status_report());
}

#[tokio::test(start_paused = true)]
async fn concurrent_stop_all_releases_every_slot() {
    let dir = tempfile::tempdir().unwrap();
    let (fleet, launcher, _) = fleet(dir.path());

    assert_eq!(fleet.load_roster().await.unwrap(), 5);
    assert_eq!(fleet.start_all(), 5);
    all_running(&fleet).await;
    assert_eq!(fleet.pool().total_allocated(), 5);
    assert_eq!(fleet.pool().allocated("nvenc"), 3);
    assert_eq!(fleet.pool().allocated("vaapi"), 2);

    let (a, b) = tokio::join!(fleet.stop_all(), fleet.stop_all());
    a.unwrap();
    b.unwrap();

    assert_eq!(fleet.pool().total_allocated(), 0);
    assert_eq!(launcher.launched(), 5);
    assert_eq!(launcher.signalled(), 5);
    assert!(fleet
        .status_report()
        .iter()
        .all(|s| s.state == WorkerState::Stopped));
}

#[tokio::test(start_paused = true)]
async fn fleet_restarts_after_full_stop() {
    let dir = tempfile::tempdir().unwrap();
    let (fleet, launcher, counter) = fleet(dir.path());
    let baseline = fleet.pool().total_allocated();

    fleet.load_roster().await.unwrap();
    fleet.start_all();
    all_running(&fleet).await;
    fleet.stop_all().await.unwrap();
    assert_eq!(fleet.pool().total_allocated(), baseline);

    assert_eq!(fleet.start_all(), 5);
    all_running(&fleet).await;
    fleet.stop_all().await.unwrap();
    assert_eq!(fleet.pool().total_allocated(), baseline);
    assert_eq!(launcher.launched(), 10);

    for _ in 0..100 {
        if counter.0.load(Ordering::SeqCst) == 10 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(counter.0.load(Ordering::SeqCst), 10);
}

#[tokio::test(start_paused = true)]
async fn status_report_lists_workers_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let (fleet, _, _) = fleet(dir.path());
    fleet.load_roster().await.unwrap();

    let report = fleet.status_report();
    let ids: Vec<&str> = report.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["c1", "c2", "c3", "c4", "c5"]);
    assert!(report.iter().all(|s| s.state == WorkerState::Stopped));
    assert_eq!(report[0].to_string(), "Front Door (c1): stopped");
}
