//! Gateway-side service registry.
//!
//! # Data Flow
//! ```text
//! DiscoverySource ──reload──▶ ServiceTable (new generation)
//!                                  │ atomic swap (ArcSwap)
//!                                  ▼
//! Router ──lookup──▶ current ServiceTable ◀──in-place health── HealthMonitor
//! ```
//!
//! # Design Decisions
//! - Readers never lock: lookups load the current table snapshot
//! - A reload replaces every entry; prior health state is discarded
//! - Unhealthy entries stay in the table so a later probe can restore them
//! - Lookups fail fast on a service already known to be down

pub mod service;
pub mod table;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

use crate::discovery::DiscoveryError;

pub use service::ServiceRegistry;
pub use table::{ServiceEntry, ServiceStatus, ServiceTable, TableSource};

/// Why a service name could not be resolved to a forwarding target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("service `{0}` is not registered")]
    Unknown(String),

    #[error("service `{0}` is currently unhealthy")]
    Unhealthy(String),
}

/// Result of one discovery reload attempt.
#[derive(Debug)]
pub enum ReloadOutcome {
    /// A new generation from discovery was installed.
    Refreshed { services: usize, generation: u64 },
    /// Discovery failed; the previous table is still in place.
    Retained { generation: u64, error: DiscoveryError },
    /// Discovery failed on first boot; the built-in table was installed.
    Fallback { services: usize, error: DiscoveryError },
}

impl ReloadOutcome {
    /// True when the gateway is not running on fresh discovery data.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, ReloadOutcome::Refreshed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReloadOutcome::Refreshed { .. } => "refreshed",
            ReloadOutcome::Retained { .. } => "retained",
            ReloadOutcome::Fallback { .. } => "fallback",
        }
    }
}
