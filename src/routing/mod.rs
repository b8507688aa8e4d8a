//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (longest-prefix lookup)
//!     → matcher.rs (segment-boundary match, rewrite)
//!     → Return: matched rule + upstream path, or no match
//!
//! Route compilation (at startup):
//!     RouteConfig[] (declaration order kept)
//!     → Compile matchers and rewrites
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{PathPrefixMatcher, PathRewrite};
pub use router::{RouteMatch, RouteRule, Router};
