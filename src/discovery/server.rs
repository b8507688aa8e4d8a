//! The discovery registry itself.
//!
//! A read-only directory: `GET /services` returns the name → address map,
//! `GET /health` reports liveness. No authentication, no pagination.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::config::DirectoryConfig;

#[derive(Debug, Clone)]
struct DirectoryState {
    services: Arc<BTreeMap<String, String>>,
}

#[derive(Serialize)]
struct RegistryHealth {
    status: &'static str,
    service: &'static str,
    services: usize,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// Build the registry's router from a directory.
pub fn directory_router(directory: &DirectoryConfig) -> Router {
    let state = DirectoryState {
        services: Arc::new(directory.services.clone()),
    };

    Router::new()
        .route("/services", get(list_services))
        .route("/health", get(health))
        .with_state(state)
}

async fn list_services(State(state): State<DirectoryState>) -> Json<BTreeMap<String, String>> {
    Json(state.services.as_ref().clone())
}

async fn health(State(state): State<DirectoryState>) -> Json<RegistryHealth> {
    Json(RegistryHealth {
        status: "OK",
        service: "discovery-registry",
        services: state.services.len(),
        timestamp: chrono::Utc::now(),
    })
}
