//! Fake discovery and probe backends for registry and monitor tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use url::Url;

use crate::config::HealthCheckConfig;
use crate::discovery::{DiscoveryError, DiscoverySource, ServiceMap};
use crate::health::probe::{HealthProbe, ProbeError};
use crate::registry::ServiceRegistry;

pub(crate) fn directory(entries: &[(&str, &str)]) -> ServiceMap {
    entries
        .iter()
        .map(|(name, addr)| (name.to_string(), Url::parse(addr).unwrap()))
        .collect()
}

/// Discovery whose answer can be changed between reloads. `None` = unreachable.
#[derive(Debug, Default)]
pub(crate) struct FakeDiscovery {
    answer: Mutex<Option<ServiceMap>>,
    calls: AtomicUsize,
}

impl FakeDiscovery {
    pub(crate) fn serving(services: ServiceMap) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Some(services)),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn unreachable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set(&self, answer: Option<ServiceMap>) {
        *self.answer.lock().unwrap() = answer;
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscoverySource for FakeDiscovery {
    async fn list_services(&self) -> Result<ServiceMap, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .lock()
            .unwrap()
            .clone()
            .ok_or(DiscoveryError::Timeout(Duration::from_secs(5)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    Up,
    Refused,
    ServerError,
    ClientError,
    Hang,
}

/// Probe whose outcome is scripted per service. Unscripted services are up.
#[derive(Debug, Default)]
pub(crate) struct FakeProbe {
    behavior: Mutex<HashMap<String, Behavior>>,
}

impl FakeProbe {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set(&self, service: &str, behavior: Behavior) {
        self.behavior
            .lock()
            .unwrap()
            .insert(service.to_string(), behavior);
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn probe(&self, service: &str, _base: &Url) -> Result<StatusCode, ProbeError> {
        let behavior = self
            .behavior
            .lock()
            .unwrap()
            .get(service)
            .copied()
            .unwrap_or(Behavior::Up);

        match behavior {
            Behavior::Up => Ok(StatusCode::OK),
            Behavior::ClientError => Ok(StatusCode::NOT_FOUND),
            Behavior::ServerError => Ok(StatusCode::INTERNAL_SERVER_ERROR),
            Behavior::Refused => Err(ProbeError::Connect("connection refused".into())),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

pub(crate) fn health_config(timeout: Duration) -> HealthCheckConfig {
    HealthCheckConfig {
        enabled: true,
        interval_secs: 3600,
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap(),
        path: "/health".into(),
        unhealthy_threshold: 1,
        healthy_threshold: 1,
    }
}

pub(crate) fn registry(
    discovery: Arc<FakeDiscovery>,
    probe: Arc<FakeProbe>,
    fallback: ServiceMap,
) -> Arc<ServiceRegistry> {
    Arc::new(ServiceRegistry::new(
        discovery,
        probe,
        fallback,
        health_config(Duration::from_millis(200)),
    ))
}
