//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery registry (server.rs)
//!     GET /services → {"fleet": "http://fleet-service:3002", ...}
//!
//! Gateway side:
//!     DiscoverySource::list_services()
//!         → http.rs (remote registry, bounded timeout)
//!         → fallback.rs (static table, never fails)
//!     → parse_directory (normalize + validate addresses)
//!     → ServiceMap handed to the service registry
//! ```
//!
//! # Design Decisions
//! - Unreachable and malformed registries are the same failure to callers
//! - Sources are trait objects so tests can substitute fakes
//! - Addresses without a scheme are treated as `http://host:port`

pub mod fallback;
pub mod http;
pub mod server;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use fallback::StaticDiscovery;
pub use http::HttpDiscovery;

/// Logical service name → normalized base address.
pub type ServiceMap = BTreeMap<String, Url>;

/// Why a discovery fetch produced no usable directory.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery request timed out after {0:?}")]
    Timeout(Duration),

    #[error("discovery transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("discovery returned status {0}")]
    Status(u16),

    #[error("discovery payload invalid: {0}")]
    InvalidPayload(String),

    #[error("discovery returned no services")]
    Empty,

    #[error("invalid service address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// A source of truth for the service directory.
#[async_trait]
pub trait DiscoverySource: Send + Sync + std::fmt::Debug {
    /// Return the full current directory. Must not have side effects.
    async fn list_services(&self) -> Result<ServiceMap, DiscoveryError>;
}

/// Normalize a directory address into an http base URL.
pub fn parse_address(raw: &str) -> Result<Url, DiscoveryError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let invalid = |reason: String| DiscoveryError::InvalidAddress {
        address: raw.to_string(),
        reason,
    };

    let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Turn a raw name → address payload into a validated directory.
///
/// Entries with unusable addresses are skipped with a warning; a payload
/// with no usable entries at all is rejected.
pub fn parse_directory<I>(raw: I) -> Result<ServiceMap, DiscoveryError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut services = ServiceMap::new();
    let mut seen = 0usize;

    for (name, address) in raw {
        seen += 1;
        if name.trim().is_empty() {
            tracing::warn!(address = %address, "Skipping discovery entry with empty name");
            continue;
        }
        match parse_address(&address) {
            Ok(url) => {
                services.insert(name, url);
            }
            Err(e) => {
                tracing::warn!(service = %name, error = %e, "Skipping discovery entry");
            }
        }
    }

    if seen == 0 {
        return Err(DiscoveryError::Empty);
    }
    if services.is_empty() {
        return Err(DiscoveryError::InvalidPayload(
            "no entry carried a usable address".to_string(),
        ));
    }
    Ok(services)
}
