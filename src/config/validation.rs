//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check route prefixes and rewrite targets are absolute paths
//! - Validate value ranges (timeouts > 0, thresholds > 0)
//! - Check every address parses as an http URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, RewriteConfig};
use crate::discovery::parse_address;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("discovery.url `{0}` is not a valid http URL")]
    DiscoveryUrl(String),

    #[error("fallback service `{name}` has invalid address `{address}`")]
    FallbackAddress { name: String, address: String },

    #[error("route `{route}`: {reason}")]
    Route { route: String, reason: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if parse_address(&config.discovery.url).is_err() {
        errors.push(ValidationError::DiscoveryUrl(config.discovery.url.clone()));
    }
    if config.discovery.timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "discovery.timeout_ms" });
    }

    for (name, address) in &config.fallback_services {
        if parse_address(address).is_err() {
            errors.push(ValidationError::FallbackAddress {
                name: name.clone(),
                address: address.clone(),
            });
        }
    }

    for route in &config.routes {
        let mut invalid = |reason| {
            errors.push(ValidationError::Route {
                route: route.name.clone(),
                reason,
            })
        };
        if !route.path_prefix.starts_with('/') {
            invalid("path_prefix must start with `/`");
        }
        if route.service.trim().is_empty() {
            invalid("service must not be empty");
        }
        if let RewriteConfig::Replace(target) = &route.rewrite {
            if !target.starts_with('/') {
                invalid("replacement must start with `/`");
            }
        }
    }

    let health = &config.health_check;
    if health.enabled {
        if health.interval_secs == 0 {
            errors.push(ValidationError::Zero { field: "health_check.interval_secs" });
        }
        if health.timeout_ms == 0 {
            errors.push(ValidationError::Zero { field: "health_check.timeout_ms" });
        }
    }
    if health.unhealthy_threshold == 0 {
        errors.push(ValidationError::Zero { field: "health_check.unhealthy_threshold" });
    }
    if health.healthy_threshold == 0 {
        errors.push(ValidationError::Zero { field: "health_check.healthy_threshold" });
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.connect_secs" });
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.upstream_secs" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }

    if config.rate_limit.enabled {
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::Zero { field: "rate_limit.max_requests" });
        }
        if config.rate_limit.window_ms == 0 {
            errors.push(ValidationError::Zero { field: "rate_limit.window_ms" });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.rate_limit.max_requests = 0;
        config.routes.push(RouteConfig {
            name: "broken".into(),
            path_prefix: "api".into(),
            service: " ".into(),
            rewrite: RewriteConfig::Replace("v1".into()),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::BindAddress("not-an-address".into())));
        assert!(errors.contains(&ValidationError::Zero { field: "rate_limit.max_requests" }));
    }

    #[test]
    fn rejects_non_http_fallback() {
        let mut config = GatewayConfig::default();
        config
            .fallback_services
            .insert("billing".into(), "ftp://billing:21".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::FallbackAddress {
                name: "billing".into(),
                address: "ftp://billing:21".into(),
            }]
        );
    }

    #[test]
    fn disabled_rate_limit_skips_range_checks() {
        let mut config = GatewayConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.window_ms = 0;
        assert!(validate_config(&config).is_ok());
    }
}
