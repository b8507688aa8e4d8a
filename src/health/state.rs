//! Service health state machine.
//!
//! # States
//! - Healthy: service receives traffic
//! - Unhealthy: lookups fail fast, entry stays in the table
//!
//! # State Transitions
//! ```text
//! (load)    → Healthy: every entry is seeded healthy
//! Healthy   → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy → Healthy: consecutive successes >= healthy_threshold
//! ```
//!
//! With both thresholds at 1 (the default) each transition is driven solely
//! by the most recent probe.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            2 => HealthState::Unhealthy,
            _ => HealthState::Healthy,
        }
    }
}

/// Health fields of one service entry, updated in place by the monitor.
#[derive(Debug)]
pub struct EntryHealth {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    /// Unix millis of the last probe attempt; 0 = never probed.
    last_checked_ms: AtomicI64,
    /// Latency of the last successful probe; 0 = unknown.
    response_time_ms: AtomicU64,
}

impl Default for EntryHealth {
    fn default() -> Self {
        Self::seeded()
    }
}

impl EntryHealth {
    /// Fresh state for a newly loaded entry: healthy until proven otherwise.
    pub fn seeded() -> Self {
        Self {
            state: AtomicU8::new(HealthState::Healthy as u8),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            last_checked_ms: AtomicI64::new(0),
            response_time_ms: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_healthy(&self) -> bool {
        self.state() == HealthState::Healthy
    }

    pub fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        match self.last_checked_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    pub fn response_time(&self) -> Option<Duration> {
        match self.response_time_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Report a successful probe. Returns the new state on a transition.
    pub fn mark_success(&self, elapsed: Duration, healthy_threshold: u32) -> Option<HealthState> {
        self.touch();
        // Sub-millisecond probes still count as "known".
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX).max(1);
        self.response_time_ms.store(ms, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.state() == HealthState::Healthy {
            return None;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.consecutive_successes.store(0, Ordering::Relaxed);
            self.state.store(HealthState::Healthy as u8, Ordering::Release);
            return Some(HealthState::Healthy);
        }
        None
    }

    /// Report a failed probe. Returns the new state on a transition.
    pub fn mark_failure(&self, unhealthy_threshold: u32) -> Option<HealthState> {
        self.touch();
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.state() == HealthState::Unhealthy {
            return None;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            self.state.store(HealthState::Unhealthy as u8, Ordering::Release);
            return Some(HealthState::Unhealthy);
        }
        None
    }

    fn touch(&self) {
        self.last_checked_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }
}
