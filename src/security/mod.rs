//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client fixed window, before routing)
//!     → [router + proxy]
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-For)
//!     → Forward to service
//! ```
//!
//! # Design Decisions
//! - Rejection short-circuits before any upstream work
//! - X-Forwarded-For is only trusted for client keys when configured

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, Admission, RateLimiter};
