//! Scripted collaborators for runtime tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::catalog::CameraRecord;
use crate::config::{Config, ResourceClassConfig};
use crate::error::{GatewayError, WorkerError};
use crate::gateway::HealthProbe;
use crate::process::{CommandSpec, EncoderFamily, Launcher, ProcessHandle};
use crate::storage::{DiskStats, SpaceProbe, GIB};

/// What one launch does.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Launch {
    /// Launch fails.
    Refuse,
    /// Process starts and dies with status 1 after the given time.
    ExitAfter(Duration),
    /// Process runs until stopped.
    Run,
}

/// Shared view of one fake process.
#[derive(Debug, Default)]
pub(crate) struct ProcState {
    pub camera: String,
    pub alive: AtomicBool,
    pub stop_requested: AtomicBool,
    pub killed: AtomicBool,
}

struct FakeProcess {
    pid: u32,
    state: Arc<ProcState>,
    exit_at: Option<Instant>,
    ignores_term: bool,
    status: Option<String>,
}

impl FakeProcess {
    fn finish(&mut self, status: &str) {
        if self.status.is_none() {
            self.status = Some(status.to_string());
        }
        self.state.alive.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessHandle for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn is_alive(&mut self) -> bool {
        if self.status.is_some() {
            return false;
        }
        if self.state.stop_requested.load(Ordering::SeqCst) && !self.ignores_term {
            self.finish("signal: 15 (SIGTERM)");
        } else if self.exit_at.is_some_and(|at| Instant::now() >= at) {
            self.finish("exit status: 1");
        }
        self.status.is_none()
    }

    fn exit_status(&self) -> Option<String> {
        self.status.clone()
    }

    fn request_stop(&mut self) {
        self.state.stop_requested.store(true, Ordering::SeqCst);
    }

    async fn force_stop(&mut self) {
        self.state.killed.store(true, Ordering::SeqCst);
        self.finish("signal: 9 (SIGKILL)");
    }
}

/// Launcher following a per-camera script, then a default step.
pub(crate) struct ScriptedLauncher {
    default: Launch,
    ignores_term: bool,
    scripts: Mutex<HashMap<String, VecDeque<Launch>>>,
    processes: Mutex<Vec<Arc<ProcState>>>,
    launches: Mutex<HashMap<String, usize>>,
    commands: Mutex<Vec<CommandSpec>>,
    next_pid: AtomicU32,
    peak: AtomicUsize,
}

impl ScriptedLauncher {
    pub fn new(default: Launch) -> Self {
        Self {
            default,
            ignores_term: false,
            scripts: Mutex::new(HashMap::new()),
            processes: Mutex::new(Vec::new()),
            launches: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            next_pid: AtomicU32::new(1000),
            peak: AtomicUsize::new(0),
        }
    }

    /// Processes only die on SIGKILL.
    pub fn ignoring_term(mut self) -> Self {
        self.ignores_term = true;
        self
    }

    /// Steps for the camera whose directory name is `camera`.
    pub fn script(&self, camera: &str, steps: impl IntoIterator<Item = Launch>) {
        self.scripts
            .lock()
            .entry(camera.to_string())
            .or_default()
            .extend(steps);
    }

    pub fn launches(&self, camera: &str) -> usize {
        self.launches.lock().get(camera).copied().unwrap_or(0)
    }

    /// Every command launched so far, in launch order.
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().clone()
    }

    pub fn processes(&self) -> Vec<Arc<ProcState>> {
        self.processes.lock().clone()
    }

    pub fn live(&self) -> usize {
        self.processes
            .lock()
            .iter()
            .filter(|p| p.alive.load(Ordering::SeqCst))
            .count()
    }

    /// Most processes alive at once, observed at launch time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    async fn launch(&self, spec: &CommandSpec) -> Result<Box<dyn ProcessHandle>, WorkerError> {
        let camera = spec
            .output_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        *self.launches.lock().entry(camera.clone()).or_default() += 1;
        self.commands.lock().push(spec.clone());

        let step = self
            .scripts
            .lock()
            .get_mut(&camera)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.default);

        let exit_at = match step {
            Launch::Refuse => {
                return Err(WorkerError::LaunchFailure {
                    reason: format!("{} refused", spec.program),
                })
            }
            Launch::ExitAfter(d) => Some(Instant::now() + d),
            Launch::Run => None,
        };

        let state = Arc::new(ProcState {
            camera,
            alive: AtomicBool::new(true),
            ..ProcState::default()
        });
        self.processes.lock().push(Arc::clone(&state));
        self.peak.fetch_max(self.live(), Ordering::SeqCst);

        Ok(Box::new(FakeProcess {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            state,
            exit_at,
            ignores_term: self.ignores_term,
            status: None,
        }))
    }
}

/// Volume of 1000 GB whose free space is set by the test.
pub(crate) struct SpaceDial(AtomicU64);

impl SpaceDial {
    pub fn new(free_gb: u64) -> Self {
        Self(AtomicU64::new(free_gb))
    }

    pub fn set_free_gb(&self, free_gb: u64) {
        self.0.store(free_gb, Ordering::SeqCst);
    }
}

impl SpaceProbe for SpaceDial {
    fn stats(&self, _path: &Path) -> io::Result<DiskStats> {
        let free = self.0.load(Ordering::SeqCst).min(1000);
        Ok(DiskStats {
            total_bytes: 1000 * GIB,
            free_bytes: free * GIB,
            used_bytes: (1000 - free) * GIB,
        })
    }
}

/// Gateway whose health is flipped by the test.
pub(crate) struct GatewayDial(AtomicBool);

impl GatewayDial {
    pub fn new(healthy: bool) -> Self {
        Self(AtomicBool::new(healthy))
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.0.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthProbe for GatewayDial {
    async fn probe(&self) -> Result<(), GatewayError> {
        if self.0.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GatewayError::Unhealthy { status: 503 })
        }
    }
}

pub(crate) fn cameras(n: usize) -> Vec<CameraRecord> {
    (1..=n)
        .map(|i| {
            CameraRecord::new(
                format!("c{i}"),
                format!("cam{i}"),
                format!("rtsp://10.0.0.{i}/stream1"),
            )
        })
        .collect()
}

/// Small fleet config: classes `a` (2 slots) and `b` (1 slot), retry every 5s.
pub(crate) fn config(root: &Path) -> Config {
    Config {
        recording_root: root.to_path_buf(),
        retention_days: 0,
        min_free_space_gb: 10,
        max_retries: 3,
        retry_delay: Duration::from_secs(5),
        poll_interval: Duration::from_secs(1),
        space_check_interval: Duration::from_secs(60),
        admission_wait: Duration::from_secs(30),
        stop_grace: Duration::from_secs(5),
        resource_classes: vec![
            ResourceClassConfig {
                name: "a".to_string(),
                capacity: 2,
                encoder: EncoderFamily::Nvenc,
            },
            ResourceClassConfig {
                name: "b".to_string(),
                capacity: 1,
                encoder: EncoderFamily::Vaapi,
            },
        ],
        ..Config::default()
    }
}
