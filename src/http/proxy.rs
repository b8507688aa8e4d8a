//! Request forwarding.
//!
//! # Responsibilities
//! - Match the request path to a route rule
//! - Resolve the target service through the registry
//! - Rewrite the path, keep the query string and body
//! - Forward with a bounded timeout and relay the answer
//!
//! # Design Decisions
//! - A failed forward never changes service health; only probes do
//! - Hop-by-hop headers are stripped on both legs
//! - Responses are streamed back, never buffered

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, Request, Uri, Version},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::error::GatewayError;
use crate::health::probe::join_path;
use crate::http::request::request_id;
use crate::observability::metrics;
use crate::registry::ServiceRegistry;
use crate::routing::Router;
use crate::security::headers::{append_forwarded_for, strip_hop_by_hop};

/// Routes inbound requests to registered services.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
    registry: Arc<ServiceRegistry>,
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        router: Arc<Router>,
        registry: Arc<ServiceRegistry>,
        connect_timeout: Duration,
        upstream_timeout: Duration,
    ) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            router,
            registry,
            client,
            upstream_timeout,
        }
    }

    /// Route one request end to end.
    pub async fn route(
        &self,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Response, GatewayError> {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let Some(matched) = self.router.match_path(&path) else {
            tracing::warn!(
                request_id = %request_id(request.headers()),
                path = %path,
                "No route matched"
            );
            metrics::record_request(method.as_str(), 404, "none", start);
            return Err(GatewayError::RouteNotFound { path });
        };

        let service = matched.rule.service.as_str();
        let result = self
            .forward(service, &matched.upstream_path, request, client_addr)
            .await;

        let status = match &result {
            Ok(response) => response.status(),
            Err(e) => e.status_code(),
        };
        metrics::record_request(method.as_str(), status.as_u16(), service, start);
        result
    }

    async fn forward(
        &self,
        service: &str,
        upstream_path: &str,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Response, GatewayError> {
        let base = self.registry.get_service_address(service)?;

        let mut target = join_path(&base, upstream_path);
        if let Some(query) = request.uri().query() {
            target.push('?');
            target.push_str(query);
        }
        let uri: Uri = target
            .parse()
            .map_err(|e| GatewayError::Internal(format!("invalid upstream uri {target}: {e}")))?;

        let (mut parts, body) = request.into_parts();
        let request_id = request_id(&parts.headers).to_string();

        tracing::debug!(
            request_id = %request_id,
            method = %parts.method,
            service = %service,
            upstream = %uri,
            "Proxying request"
        );

        strip_hop_by_hop(&mut parts.headers);
        parts.headers.remove(header::HOST);
        if let Some(addr) = client_addr {
            append_forwarded_for(&mut parts.headers, addr.ip());
        }
        parts.uri = uri;
        parts.version = Version::HTTP_11;

        let upstream = Request::from_parts(parts, body);
        match tokio::time::timeout(self.upstream_timeout, self.client.request(upstream)).await {
            Ok(Ok(response)) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Ok(Err(e)) => {
                tracing::error!(request_id = %request_id, service = %service, error = %e, "Upstream error");
                Err(GatewayError::UpstreamUnreachable {
                    service: service.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                tracing::error!(
                    request_id = %request_id,
                    service = %service,
                    timeout = ?self.upstream_timeout,
                    "Upstream timed out"
                );
                Err(GatewayError::UpstreamTimeout {
                    service: service.to_string(),
                })
            }
        }
    }
}
