//! Liveness probes.
//!
//! # Responsibilities
//! - Issue one request against a service's health endpoint
//! - Report the status or the transport failure
//!
//! # Design Decisions
//! - The deadline is applied by the monitor, so every probe implementation
//!   (including test fakes) is bounded the same way
//! - Classification (5xx = unhealthy) lives in the monitor, not the probe

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use url::Url;

/// Why a probe did not produce a usable status.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build probe request: {0}")]
    Request(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Checks the liveness of one service.
#[async_trait]
pub trait HealthProbe: Send + Sync + std::fmt::Debug {
    async fn probe(&self, service: &str, base: &Url) -> Result<StatusCode, ProbeError>;
}

/// Probes `GET {base}{path}` over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client<HttpConnector, Body>,
    path: String,
}

impl HttpProbe {
    pub fn new(path: impl Into<String>, connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            path: path.into(),
        }
    }
}

/// Append `path` to `base`, keeping any path the base already carries.
pub(crate) fn join_path(base: &Url, path: &str) -> String {
    let root = base.as_str().trim_end_matches('/');
    if path.starts_with('/') {
        format!("{root}{path}")
    } else {
        format!("{root}/{path}")
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, service: &str, base: &Url) -> Result<StatusCode, ProbeError> {
        let uri = join_path(base, &self.path);

        let request = Request::builder()
            .method("GET")
            .uri(&uri)
            .header("user-agent", "edge-gateway-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        tracing::trace!(service = %service, uri = %uri, "Probing service");

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        Ok(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};

    #[test]
    fn join_keeps_base_path() {
        let base = Url::parse("http://fleet:3002").unwrap();
        assert_eq!(join_path(&base, "/health"), "http://fleet:3002/health");

        let nested = Url::parse("http://fleet:3002/internal/").unwrap();
        assert_eq!(join_path(&nested, "health"), "http://fleet:3002/internal/health");
    }

    #[tokio::test]
    async fn reports_backend_status() {
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/broken/health", get(|| async { (StatusCode::BAD_GATEWAY, "down") }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let probe = HttpProbe::new("/health", Duration::from_secs(1));

        let base = Url::parse(&format!("http://{addr}")).unwrap();
        assert_eq!(probe.probe("fleet", &base).await.unwrap(), StatusCode::OK);

        let broken = Url::parse(&format!("http://{addr}/broken")).unwrap();
        assert_eq!(
            probe.probe("fleet", &broken).await.unwrap(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn refused_connection_is_error() {
        let probe = HttpProbe::new("/health", Duration::from_secs(1));
        let base = Url::parse("http://127.0.0.1:9").unwrap();
        assert!(matches!(
            probe.probe("fleet", &base).await,
            Err(ProbeError::Connect(_))
        ));
    }
}
