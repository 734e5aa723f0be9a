use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::fleet::{Fleet, FleetParts};
use crate::catalog::{Catalog, ConnectivityGuard, StaticCatalog};
use crate::config::Config;
use crate::error::ConfigError;
use crate::events::Bus;
use crate::gateway::{DependencyHealthMonitor, HealthProbe};
use crate::process::{ChildLauncher, Launcher};
use crate::resources::ResourcePool;
use crate::storage::{Maintenance, RetentionEngine, SpaceProbe, StatvfsProbe};
use crate::subscribers::{CatalogWriter, LogWriter, Subscribe, SubscriberSet};

/// Builder for a [`Fleet`] with swappable collaborators.
///
/// Defaults: [`StaticCatalog`] over `cfg.cameras`, [`ChildLauncher`], [`StatvfsProbe`],
/// no gateway monitor.
pub struct FleetBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    catalog: Option<Arc<dyn Catalog>>,
    launcher: Option<Arc<dyn Launcher>>,
    space_probe: Option<Arc<dyn SpaceProbe>>,
    gateway_probe: Option<Arc<dyn HealthProbe>>,
}

impl FleetBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            catalog: None,
            launcher: None,
            space_probe: None,
            gateway_probe: None,
        }
    }

    /// Adds event subscribers next to the built-in log and catalog writers.
    ///
    /// Subscribers receive runtime events through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the catalog serving the roster and receiving status and segment writes.
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Sets the process launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Sets the free-space probe of the recording volume.
    pub fn with_space_probe(mut self, probe: Arc<dyn SpaceProbe>) -> Self {
        self.space_probe = Some(probe);
        self
    }

    /// Enables the gateway health monitor, cached for `gateway.check_interval`.
    pub fn with_gateway_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.gateway_probe = Some(probe);
        self
    }

    /// Builds and returns the Fleet instance.
    ///
    /// Must be called inside a tokio runtime: the subscriber workers and the bus
    /// listener are spawned here.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] if the configuration fails validation.
    pub fn build(self) -> Result<Arc<Fleet>, ConfigError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();

        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(StaticCatalog::new(self.cfg.cameras.clone())));
        let guard = Arc::new(ConnectivityGuard::new(
            catalog,
            self.cfg.catalog.connect_attempts,
            self.cfg.catalog.connect_base_delay,
        ));

        let mut subscribers: Vec<Arc<dyn Subscribe>> = vec![
            Arc::new(LogWriter::new()),
            Arc::new(CatalogWriter::new(
                Arc::clone(&guard),
                self.cfg.segment.quality.clone(),
            )),
        ];
        subscribers.extend(self.subscribers);
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));
        subscriber_listener(&bus, &subs);

        let probe = self
            .space_probe
            .unwrap_or_else(|| Arc::new(StatvfsProbe));
        let retention = Arc::new(RetentionEngine::from_config(&self.cfg, probe));
        let maintenance = Arc::new(Maintenance::from_config(
            &self.cfg,
            Arc::clone(&retention),
            bus.clone(),
        ));
        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(ChildLauncher::new(self.cfg.segment.startup_probe)));
        let gateway = self.gateway_probe.map(|probe| {
            Arc::new(DependencyHealthMonitor::new(
                probe,
                self.cfg.gateway.check_interval,
            ))
        });
        let pool = Arc::new(ResourcePool::from_config(&self.cfg.resource_classes));

        Ok(Arc::new(Fleet::new_internal(FleetParts {
            cfg: self.cfg,
            bus,
            subs,
            pool,
            retention,
            maintenance,
            launcher,
            catalog: guard,
            gateway,
            runtime_token,
        })))
    }
}

/// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
fn subscriber_listener(bus: &Bus, subs: &Arc<SubscriberSet>) {
    let mut rx = bus.subscribe();
    let set = Arc::clone(subs);
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => set.emit(ev),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event listener lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
