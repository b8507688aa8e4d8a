//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared by value or Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable for the process lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_directory, ConfigError};
pub use schema::{
    DirectoryConfig, DiscoveryConfig, GatewayConfig, HealthCheckConfig, ListenerConfig,
    ObservabilityConfig, RateLimitConfig, RewriteConfig, RouteConfig, SecurityConfig,
    TimeoutConfig,
};
