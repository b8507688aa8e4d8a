//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use edge_gateway::config::{DirectoryConfig, GatewayConfig, RewriteConfig, RouteConfig};
use edge_gateway::discovery::server::directory_router;
use edge_gateway::{HttpServer, ServiceRegistry, Shutdown};

/// A backend that echoes what it received and serves a switchable `/health`.
pub struct Backend {
    pub addr: SocketAddr,
    health_status: Arc<AtomicU16>,
}

impl Backend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_health(&self, status: u16) {
        self.health_status.store(status, Ordering::SeqCst);
    }
}

pub async fn start_echo_backend() -> Backend {
    let health_status = Arc::new(AtomicU16::new(200));

    let app = Router::new()
        .route("/health", get(backend_health))
        .fallback(echo)
        .with_state(health_status.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Backend {
        addr,
        health_status,
    }
}

/// A backend whose proxied routes answer only after `delay`.
pub async fn start_slow_backend(delay: Duration) -> Backend {
    let health_status = Arc::new(AtomicU16::new(200));

    let app = Router::new()
        .route("/health", get(backend_health))
        .fallback(move || async move {
            tokio::time::sleep(delay).await;
            "late"
        })
        .with_state(health_status.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Backend {
        addr,
        health_status,
    }
}

async fn backend_health(State(status): State<Arc<AtomicU16>>) -> StatusCode {
    StatusCode::from_u16(status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK)
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "body": body,
        "x_forwarded_for": header("x-forwarded-for"),
        "x_request_id": header("x-request-id"),
        "connection": header("connection"),
    }))
}

/// Serve a discovery directory; returns the `/services` URL.
pub async fn start_registry(services: &[(&str, String)]) -> String {
    let directory = DirectoryConfig {
        bind_address: "127.0.0.1:0".into(),
        services: services
            .iter()
            .map(|(name, addr)| (name.to_string(), addr.clone()))
            .collect::<BTreeMap<_, _>>(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = directory_router(&directory);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/services")
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Gateway config tuned for tests: short timeouts, no metrics, no periodic probes.
pub fn gateway_config(discovery_url: String) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.discovery.url = discovery_url;
    config.discovery.timeout_ms = 500;
    config.health_check.enabled = false;
    config.health_check.timeout_ms = 500;
    config.timeouts.connect_secs = 1;
    config.timeouts.upstream_secs = 2;
    config.observability.metrics_enabled = false;
    config.routes.push(RouteConfig {
        name: "agencies".into(),
        path_prefix: "/api/agencies".into(),
        service: "agency".into(),
        rewrite: RewriteConfig::Strip,
    });
    config
}

pub struct Gateway {
    pub addr: SocketAddr,
    pub registry: Arc<ServiceRegistry>,
    pub shutdown: Shutdown,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(&self) {
        self.shutdown.trigger();
        self.registry.stop().await;
    }
}

pub async fn start_gateway(config: GatewayConfig) -> Gateway {
    let registry = Arc::new(ServiceRegistry::from_config(&config).unwrap());
    registry.initialize().await.unwrap();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, registry.clone());
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });

    Gateway {
        addr,
        registry,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
