//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: introspection routes plus the proxy fallback
//! - Wire up middleware (request ID, tracing, timeout, body limit, rate limit)
//! - Bind the server to a listener and drain on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::proxy::Dispatcher;
use crate::http::request::{peer_addr, UuidRequestId, X_REQUEST_ID};
use crate::registry::{ServiceRegistry, ServiceStatus, TableSource};
use crate::routing::Router as RouteTable;
use crate::security::{rate_limit_middleware, RateLimiter};

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub registry: Arc<ServiceRegistry>,
}

#[derive(Debug, Serialize)]
struct GatewayHealth {
    status: &'static str,
    service: &'static str,
    timestamp: DateTime<Utc>,
    healthy_services: usize,
    total_services: usize,
}

#[derive(Debug, Serialize)]
struct ServicesHealth {
    generation: u64,
    source: TableSource,
    services: Vec<ServiceStatus>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    limiter: Option<Arc<RateLimiter>>,
}

impl HttpServer {
    pub fn new(config: &GatewayConfig, registry: Arc<ServiceRegistry>) -> Self {
        let routes = Arc::new(RouteTable::from_config(config.routes.clone()));
        let dispatcher = Dispatcher::new(
            routes,
            Arc::clone(&registry),
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.upstream_secs),
        );

        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::from_config(&config.rate_limit)));

        let state = AppState {
            dispatcher,
            registry,
        };
        let router = Self::build_router(config, state, limiter.clone());

        Self { router, limiter }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &GatewayConfig,
        state: AppState,
        limiter: Option<Arc<RateLimiter>>,
    ) -> Router {
        let mut proxy = Router::new()
            .fallback(proxy_handler)
            .with_state(state.clone());
        if let Some(limiter) = limiter {
            proxy = proxy.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        Router::new()
            .route("/health", get(gateway_health))
            .route("/health/services", get(services_health))
            .with_state(state)
            .merge(proxy)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// The assembled router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(limiter) = self.limiter {
            tokio::spawn(limiter.run_sweeper(shutdown.resubscribe()));
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let client_addr = peer_addr(&request);
    match state.dispatcher.route(request, client_addr).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn gateway_health(State(state): State<AppState>) -> Json<GatewayHealth> {
    let table = state.registry.table();
    Json(GatewayHealth {
        status: "OK",
        service: "gateway-service",
        timestamp: Utc::now(),
        healthy_services: table.healthy_count(),
        total_services: table.len(),
    })
}

async fn services_health(State(state): State<AppState>) -> Json<ServicesHealth> {
    let table = state.registry.table();
    Json(ServicesHealth {
        generation: table.generation(),
        source: table.source(),
        services: state.registry.get_health_snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RateLimitConfig, RouteConfig};
    use crate::discovery::ServiceMap;
    use crate::registry::testing::{directory, registry, Behavior, FakeDiscovery, FakeProbe};
    use crate::health::HealthMonitor;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    async fn app(config: GatewayConfig, probe: Arc<FakeProbe>) -> (Router, Arc<ServiceRegistry>) {
        // Port 9 (discard) on loopback refuses connections.
        let services = directory(&[("auth", "http://127.0.0.1:9"), ("fleet", "http://127.0.0.1:9")]);
        let registry = registry(FakeDiscovery::serving(services), probe, ServiceMap::new());
        registry.reload_from_discovery().await;

        let router = HttpServer::new(&config, registry.clone())
            .router()
            .layer(MockConnectInfo(SocketAddr::from(([10, 1, 2, 3], 40000))));
        (router, registry)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unknown_route_is_404_with_request_id() {
        let (app, _) = app(GatewayConfig::default(), FakeProbe::new()).await;

        let response = app.oneshot(get_req("/unknown/x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(&X_REQUEST_ID));
        assert_eq!(json(response).await["error"]["code"], "route_not_found");
    }

    #[tokio::test]
    async fn unregistered_service_is_404() {
        let (app, _) = app(GatewayConfig::default(), FakeProbe::new()).await;

        let response = app.oneshot(get_req("/maintenance/jobs")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["error"]["code"], "service_unknown");
    }

    #[tokio::test]
    async fn unhealthy_service_is_503() {
        let probe = FakeProbe::new();
        let (app, registry) = app(GatewayConfig::default(), probe.clone()).await;
        probe.set("fleet", Behavior::Refused);
        HealthMonitor::new(registry.clone(), probe, crate::registry::testing::health_config(Duration::from_millis(100)))
            .tick()
            .await;

        let response = app.oneshot(get_req("/fleet/vehicles")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json(response).await["error"]["code"], "service_unhealthy");
    }

    #[tokio::test]
    async fn refused_upstream_is_502() {
        let (app, _) = app(GatewayConfig::default(), FakeProbe::new()).await;

        let response = app.oneshot(get_req("/auth/login")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json(response).await["error"]["code"], "upstream_unreachable");
    }

    #[tokio::test]
    async fn health_endpoints_report_registry() {
        let (app, _) = app(GatewayConfig::default(), FakeProbe::new()).await;

        let response = app.clone().oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["total_services"], 2);

        let response = app.oneshot(get_req("/health/services")).await.unwrap();
        let body = json(response).await;
        assert_eq!(body["source"], "discovery");
        assert_eq!(body["services"][0]["name"], "auth");
        assert_eq!(body["services"][1]["healthy"], true);
    }

    #[tokio::test]
    async fn rate_limit_rejects_before_routing() {
        let config = GatewayConfig {
            rate_limit: RateLimitConfig {
                max_requests: 2,
                ..RateLimitConfig::default()
            },
            routes: vec![RouteConfig {
                name: "auth".into(),
                path_prefix: "/auth".into(),
                service: "auth".into(),
                rewrite: Default::default(),
            }],
            ..GatewayConfig::default()
        };
        let (app, _) = app(config, FakeProbe::new()).await;

        let first = app.clone().oneshot(get_req("/nowhere")).await.unwrap();
        assert_eq!(first.status(), StatusCode::NOT_FOUND);
        assert_eq!(first.headers()["x-ratelimit-remaining"], "1");
        app.clone().oneshot(get_req("/nowhere")).await.unwrap();

        let rejected = app.clone().oneshot(get_req("/nowhere")).await.unwrap();
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(rejected.headers().contains_key("retry-after"));

        // Introspection is not counted.
        let health = app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
