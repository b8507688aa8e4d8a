//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Where the service directory is fetched from.
    pub discovery: DiscoveryConfig,

    /// Table installed when discovery is unreachable on first boot.
    pub fallback_services: BTreeMap<String, String>,

    /// Route definitions mapping path prefixes to services.
    pub routes: Vec<RouteConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request hardening.
    pub security: SecurityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            discovery: DiscoveryConfig::default(),
            fallback_services: default_fallback_services(),
            routes: default_routes(),
            health_check: HealthCheckConfig::default(),
            timeouts: TimeoutConfig::default(),
            rate_limit: RateLimitConfig::default(),
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

/// Built-in table used when the discovery registry cannot be reached at boot.
pub fn default_fallback_services() -> BTreeMap<String, String> {
    [
        ("auth", "http://localhost:3001"),
        ("fleet", "http://localhost:3002"),
        ("reservation", "http://localhost:3004"),
        ("feedback", "http://localhost:3007"),
        ("promotion", "http://localhost:3008"),
    ]
    .into_iter()
    .map(|(name, addr)| (name.to_string(), addr.to_string()))
    .collect()
}

/// One strip-prefix route per platform service, `/<name>` → `<name>`.
pub fn default_routes() -> Vec<RouteConfig> {
    [
        "auth",
        "fleet",
        "reservation",
        "promotion",
        "feedback",
        "assurance",
        "maintenance",
    ]
    .into_iter()
    .map(|service| RouteConfig {
        name: service.to_string(),
        path_prefix: format!("/{service}"),
        service: service.to_string(),
        rewrite: RewriteConfig::Strip,
    })
    .collect()
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
        }
    }
}

/// Discovery registry client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Full URL of the "list services" endpoint.
    pub url: String,

    /// Deadline for one discovery fetch in milliseconds.
    pub timeout_ms: u64,

    /// Periodic reload interval in seconds; 0 loads once at startup only.
    pub refresh_interval_secs: u64,
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000/services".to_string(),
            timeout_ms: 5_000,
            refresh_interval_secs: 0,
        }
    }
}

/// Route configuration mapping a path prefix to a service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match, on segment boundaries.
    pub path_prefix: String,

    /// Logical service name resolved through the service registry.
    pub service: String,

    /// How the matched prefix is rewritten before forwarding.
    #[serde(default)]
    pub rewrite: RewriteConfig,
}

/// Path rewrite policy applied to the matched prefix.
///
/// In TOML: `rewrite = "strip"` or `rewrite = { replace = "/v1" }`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewriteConfig {
    /// Remove the prefix entirely.
    #[default]
    Strip,
    /// Replace the prefix with the given path.
    Replace(String),
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path to probe on each service.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy again.
    pub healthy_threshold: u32,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_ms: 5_000,
            path: "/health".to_string(),
            unhealthy_threshold: 1,
            healthy_threshold: 1,
        }
    }
}

/// Timeout configuration for proxied requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Upstream response timeout in seconds.
    pub upstream_secs: u64,

    /// Total inbound request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            request_secs: 60,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests admitted per client per window.
    pub max_requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Only paths under these prefixes are counted.
    pub path_prefixes: Vec<String>,

    /// Key clients by the first `X-Forwarded-For` hop instead of the peer address.
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_ms: 15 * 60 * 1000,
            path_prefixes: vec!["/".to_string()],
            trust_forwarded_for: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Directory published by the discovery registry binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Bind address for the registry.
    pub bind_address: String,

    /// Logical service name → base address.
    pub services: BTreeMap<String, String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        let services = [
            ("auth", "http://auth-user-service:3001"),
            ("fleet", "http://fleet-service:3002"),
            ("reservation", "http://reservation-service:3003"),
            ("promotion", "http://promotion-coupon-service:3006"),
            ("feedback", "http://feedback-complaints-service:3005"),
            ("assurance", "http://assurence-claims-service:3004"),
            ("maintenance", "http://maintenance-service:3007"),
        ]
        .into_iter()
        .map(|(name, addr)| (name.to_string(), addr.to_string()))
        .collect();

        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:4000");
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_ms, 900_000);
        assert_eq!(config.routes.len(), 7);
        assert!(!config.fallback_services.is_empty());
    }

    #[test]
    fn parses_both_rewrite_forms() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [[routes]]
            name = "agencies"
            path_prefix = "/api/agencies"
            service = "agency"
            rewrite = "strip"

            [[routes]]
            name = "fleet"
            path_prefix = "/api/fleet"
            service = "fleet"
            rewrite = { replace = "/v1/vehicles" }

            [[routes]]
            name = "auth"
            path_prefix = "/api/auth"
            service = "auth"
            "#,
        )
        .unwrap();

        assert_eq!(config.routes.len(), 3);
        assert_eq!(config.routes[0].rewrite, RewriteConfig::Strip);
        assert_eq!(
            config.routes[1].rewrite,
            RewriteConfig::Replace("/v1/vehicles".into())
        );
        assert_eq!(config.routes[2].rewrite, RewriteConfig::Strip);
    }

    #[test]
    fn refresh_interval_zero_disables_reload() {
        let mut discovery = DiscoveryConfig::default();
        assert!(discovery.refresh_interval().is_none());
        discovery.refresh_interval_secs = 60;
        assert_eq!(discovery.refresh_interval(), Some(Duration::from_secs(60)));
    }
}
