//! Service registry: discovery reloads, lookups, monitor lifecycle.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::{GatewayConfig, HealthCheckConfig};
use crate::discovery::{
    DiscoveryError, DiscoverySource, HttpDiscovery, ServiceMap, StaticDiscovery,
};
use crate::error::GatewayError;
use crate::health::active::HealthMonitor;
use crate::health::probe::{HealthProbe, HttpProbe};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::registry::table::{ServiceEntry, ServiceStatus, ServiceTable, TableSource};
use crate::registry::{LookupError, ReloadOutcome};

struct MonitorHandle {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

/// Caches the discovery directory and annotates it with live health.
pub struct ServiceRegistry {
    table: ArcSwap<ServiceTable>,
    generation: AtomicU64,
    discovery: Arc<dyn DiscoverySource>,
    probe: Arc<dyn HealthProbe>,
    fallback: ServiceMap,
    health: HealthCheckConfig,
    refresh_interval: Option<Duration>,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.load();
        f.debug_struct("ServiceRegistry")
            .field("generation", &table.generation())
            .field("source", &table.source())
            .field("services", &table.len())
            .field("discovery", &self.discovery)
            .finish_non_exhaustive()
    }
}

impl ServiceRegistry {
    pub fn new(
        discovery: Arc<dyn DiscoverySource>,
        probe: Arc<dyn HealthProbe>,
        fallback: ServiceMap,
        health: HealthCheckConfig,
    ) -> Self {
        Self {
            table: ArcSwap::from_pointee(ServiceTable::default()),
            generation: AtomicU64::new(0),
            discovery,
            probe,
            fallback,
            health,
            refresh_interval: None,
            monitor: Mutex::new(None),
        }
    }

    /// Reload from discovery on this interval while monitoring runs.
    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Wire up the HTTP discovery client and HTTP probe from configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, DiscoveryError> {
        let discovery = HttpDiscovery::from_config(&config.discovery)?;
        let probe = HttpProbe::new(
            config.health_check.path.clone(),
            Duration::from_secs(config.timeouts.connect_secs),
        );

        let fallback = match StaticDiscovery::from_config(&config.fallback_services) {
            Ok(source) => source.services().clone(),
            Err(e) => {
                tracing::warn!(error = %e, "Fallback service table is unusable");
                ServiceMap::new()
            }
        };

        Ok(Self::new(
            Arc::new(discovery),
            Arc::new(probe),
            fallback,
            config.health_check.clone(),
        )
        .with_refresh_interval(config.discovery.refresh_interval()))
    }

    /// Load the directory once, then start health monitoring.
    ///
    /// A degraded outcome (fallback table) is returned, not raised; the only
    /// error is ending up with no services at all.
    pub async fn initialize(self: &Arc<Self>) -> Result<ReloadOutcome, GatewayError> {
        tracing::info!("Initializing service registry");

        let outcome = self.reload_from_discovery().await;
        let table = self.table.load_full();
        if table.is_empty() {
            tracing::error!("No usable service table: discovery failed and fallback is empty");
            return Err(GatewayError::NoServiceTable);
        }

        if let ReloadOutcome::Fallback { error, .. } = &outcome {
            tracing::warn!(error = %error, "Running in degraded mode on the fallback service table");
        }

        let mut names: Vec<&str> = table.entries().map(|e| e.name()).collect();
        names.sort_unstable();
        tracing::info!(
            services = %names.join(", "),
            source = ?table.source(),
            "Service registry initialized"
        );

        if self.health.enabled {
            self.start_health_monitoring(self.health.interval()).await;
        } else {
            tracing::info!("Active health checks disabled");
        }

        Ok(outcome)
    }

    /// Fetch the directory and atomically replace the current table.
    ///
    /// On failure the previous table is kept; on first boot the fallback
    /// table is installed instead.
    pub async fn reload_from_discovery(&self) -> ReloadOutcome {
        let result = match self.discovery.list_services().await {
            Ok(services) if services.is_empty() => Err(DiscoveryError::Empty),
            other => other,
        };

        let outcome = match result {
            Ok(services) => {
                let generation = self.install(TableSource::Discovery, &services);
                tracing::info!(
                    services = services.len(),
                    generation,
                    "Loaded services from discovery"
                );
                ReloadOutcome::Refreshed {
                    services: services.len(),
                    generation,
                }
            }
            Err(error) => {
                let current = self.table.load();
                if current.source() != TableSource::Empty {
                    tracing::warn!(
                        error = %error,
                        generation = current.generation(),
                        "Discovery reload failed, keeping current service table"
                    );
                    ReloadOutcome::Retained {
                        generation: current.generation(),
                        error,
                    }
                } else {
                    tracing::warn!(error = %error, "Discovery unreachable, using fallback service configuration");
                    if !self.fallback.is_empty() {
                        self.install(TableSource::Fallback, &self.fallback);
                    }
                    ReloadOutcome::Fallback {
                        services: self.fallback.len(),
                        error,
                    }
                }
            }
        };

        metrics::record_discovery_reload(outcome.label());
        outcome
    }

    fn install(&self, source: TableSource, services: &ServiceMap) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.publish(Arc::new(ServiceTable::new(generation, source, services)));
        generation
    }

    /// Swap `table` in unless a newer generation is already current.
    fn publish(&self, table: Arc<ServiceTable>) -> bool {
        let previous = self.table.rcu(|current| {
            if current.generation() > table.generation() {
                Arc::clone(current)
            } else {
                Arc::clone(&table)
            }
        });

        let installed = previous.generation() <= table.generation();
        if !installed {
            tracing::debug!(
                stale = table.generation(),
                current = previous.generation(),
                "Discarding stale service table"
            );
        }
        installed
    }

    /// Resolve a service name to its forwarding address.
    pub fn get_service_address(&self, name: &str) -> Result<Url, LookupError> {
        let table = self.table.load();
        match table.get(name) {
            None => Err(LookupError::Unknown(name.to_string())),
            Some(entry) if !entry.health().is_healthy() => {
                Err(LookupError::Unhealthy(name.to_string()))
            }
            Some(entry) => Ok(entry.base_address().clone()),
        }
    }

    /// Name → address for every registered service, healthy or not.
    pub fn get_all_services(&self) -> BTreeMap<String, String> {
        self.table
            .load()
            .entries()
            .map(|e| (e.name().to_string(), e.base_address().to_string()))
            .collect()
    }

    /// Status of every registered service, sorted by name.
    pub fn get_health_snapshot(&self) -> Vec<ServiceStatus> {
        let mut statuses: Vec<_> = self.table.load().entries().map(|e| e.status()).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// The current table generation.
    pub fn table(&self) -> Arc<ServiceTable> {
        self.table.load_full()
    }

    /// Entries of the current table, for probing.
    pub fn entries(&self) -> Vec<Arc<ServiceEntry>> {
        self.table.load().entries().cloned().collect()
    }

    /// Spawn the health monitor. No-op if one is already running or
    /// `interval` is zero.
    pub async fn start_health_monitoring(self: &Arc<Self>, interval: Duration) {
        if interval.is_zero() {
            tracing::error!("Health check interval must be non-zero, monitor not started");
            return;
        }

        let mut slot = self.monitor.lock().await;
        if slot.is_some() {
            tracing::debug!("Health monitor already running");
            return;
        }

        let monitor = HealthMonitor::new(Arc::clone(self), Arc::clone(&self.probe), self.health.clone())
            .with_interval(interval)
            .with_refresh_interval(self.refresh_interval);

        let shutdown = Shutdown::new();
        let stop = shutdown.subscribe();
        let task = tokio::spawn(async move {
            monitor.run(stop).await;
        });

        *slot = Some(MonitorHandle { shutdown, task });
    }

    /// Stop the health monitor and wait for its task to finish.
    pub async fn stop(&self) {
        let handle = self.monitor.lock().await.take();
        if let Some(MonitorHandle { shutdown, task }) = handle {
            shutdown.trigger();
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Health monitor task ended abnormally");
            }
        }
    }

    pub async fn is_monitoring(&self) -> bool {
        self.monitor.lock().await.is_some()
    }
}
