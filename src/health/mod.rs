//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe every registered service concurrently (probe.rs)
//!     → Update entry state (state.rs)
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy
//!     Consecutive thresholds, both 1 by default
//! ```
//!
//! # Design Decisions
//! - Entries are seeded healthy on every table load
//! - A failed probe never removes an entry
//! - Proxied request failures do not feed back into health state

pub mod active;
pub mod probe;
pub mod state;

pub use active::{HealthMonitor, TickReport};
pub use probe::{HealthProbe, HttpProbe, ProbeError};
pub use state::{EntryHealth, HealthState};
