//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered service, all probes of a tick in
//!   parallel, each under its own deadline
//! - Update entry health in place based on results
//! - Optionally reload the directory from discovery on a second timer

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::HealthProbe;
use crate::health::state::HealthState;
use crate::observability::metrics;
use crate::registry::{ServiceEntry, ServiceRegistry};

/// Counts from one round of probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub healthy: usize,
    pub total: usize,
}

pub struct HealthMonitor {
    registry: Arc<ServiceRegistry>,
    probe: Arc<dyn HealthProbe>,
    config: HealthCheckConfig,
    interval: Duration,
    refresh_interval: Option<Duration>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        probe: Arc<dyn HealthProbe>,
        config: HealthCheckConfig,
    ) -> Self {
        let interval = config.interval();
        Self {
            registry,
            probe,
            config,
            interval,
            refresh_interval: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            timeout_ms = self.config.timeout_ms,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut refresh = self.refresh_interval.map(|every| {
            let mut refresh = time::interval_at(Instant::now() + every, every);
            refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
            refresh
        });

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = next_refresh(&mut refresh) => {
                    self.registry.reload_from_discovery().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every service in the current table once.
    pub async fn tick(&self) -> TickReport {
        let entries = self.registry.entries();
        let results = join_all(entries.iter().map(|entry| self.check(entry))).await;

        let report = TickReport {
            healthy: results.iter().filter(|healthy| **healthy).count(),
            total: results.len(),
        };
        tracing::debug!(
            healthy = report.healthy,
            total = report.total,
            "Health check: {}/{} services healthy",
            report.healthy,
            report.total
        );
        report
    }

    async fn check(&self, entry: &ServiceEntry) -> bool {
        let name = entry.name();
        let timeout = self.config.timeout();
        let started = Instant::now();

        let probe = self.probe.probe(name, entry.base_address());
        let healthy = match time::timeout(timeout, probe).await {
            Ok(Ok(status)) if status.as_u16() < 500 => true,
            Ok(Ok(status)) => {
                tracing::warn!(service = %name, status = %status, "Health check failed: server error status");
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(service = %name, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(service = %name, timeout = ?timeout, "Health check failed: timeout");
                false
            }
        };

        let health = entry.health();
        let transition = if healthy {
            health.mark_success(started.elapsed(), self.config.healthy_threshold)
        } else {
            health.mark_failure(self.config.unhealthy_threshold)
        };

        match transition {
            Some(HealthState::Healthy) => {
                tracing::info!(service = %name, "Service recovered");
            }
            Some(HealthState::Unhealthy) => {
                tracing::warn!(service = %name, address = %entry.base_address(), "Service marked unhealthy");
            }
            None => {}
        }

        metrics::record_service_health(name, health.is_healthy());
        health.is_healthy()
    }
}

async fn next_refresh(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
