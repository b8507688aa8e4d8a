//! Gateway error taxonomy and its HTTP rendering.
//!
//! Every failure in the request pipeline ends up here and is converted at the
//! outer boundary into a JSON body of the form
//! `{"error": {"code": "...", "message": "..."}}`.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::registry::LookupError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// No route rule matches the request path.
    #[error("no route matches path {path}")]
    RouteNotFound { path: String },

    /// A route targets a service the registry does not know.
    #[error("service `{0}` is not registered")]
    ServiceUnknown(String),

    /// The target service failed its last health check.
    #[error("service `{0}` is unavailable")]
    ServiceUnhealthy(String),

    /// The upstream could not be reached or broke the connection.
    #[error("upstream `{service}` unreachable: {reason}")]
    UpstreamUnreachable { service: String, reason: String },

    /// The upstream did not answer within the deadline.
    #[error("upstream `{service}` timed out")]
    UpstreamTimeout { service: String },

    #[error("rate limit exceeded, retry in {}ms", .retry_after.as_millis())]
    RateLimitExceeded { retry_after: Duration },

    /// Startup ended with neither a discovery nor a fallback table.
    #[error("no usable service table")]
    NoServiceTable,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl GatewayError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } | Self::ServiceUnknown(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnhealthy(_) | Self::NoServiceTable => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RouteNotFound { .. } => "route_not_found",
            Self::ServiceUnknown(_) => "service_unknown",
            Self::ServiceUnhealthy(_) => "service_unhealthy",
            Self::UpstreamUnreachable { .. } => "upstream_unreachable",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::NoServiceTable => "no_service_table",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whole seconds to put in `Retry-After`, rounded up, at least 1.
    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded { retry_after } => {
                let millis = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX);
                Some(millis.div_ceil(1000).max(1))
            }
            _ => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after_secs();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<LookupError> for GatewayError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Unknown(name) => Self::ServiceUnknown(name),
            LookupError::Unhealthy(name) => Self::ServiceUnhealthy(name),
        }
    }
}
