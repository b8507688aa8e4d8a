//! Versioned service tables.
//!
//! # Responsibilities
//! - Represent one discovery generation of the directory
//! - Carry per-entry health state that the monitor updates in place
//! - Produce read-only status views for introspection

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::discovery::ServiceMap;
use crate::health::state::EntryHealth;

/// Where a table's entries came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSource {
    /// Nothing loaded yet.
    Empty,
    /// A successful discovery fetch.
    Discovery,
    /// The built-in table installed because discovery failed at boot.
    Fallback,
}

/// One registered service.
#[derive(Debug)]
pub struct ServiceEntry {
    name: String,
    base_address: Url,
    health: EntryHealth,
}

impl ServiceEntry {
    pub fn new(name: impl Into<String>, base_address: Url) -> Self {
        Self {
            name: name.into(),
            base_address,
            health: EntryHealth::seeded(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_address(&self) -> &Url {
        &self.base_address
    }

    pub fn health(&self) -> &EntryHealth {
        &self.health
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            name: self.name.clone(),
            address: self.base_address.to_string(),
            healthy: self.health.is_healthy(),
            last_checked_at: self.health.last_checked_at(),
            response_time_ms: self
                .health
                .response_time()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

/// Read-only view of one entry, as served by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub address: String,
    pub healthy: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub response_time_ms: Option<u64>,
}

/// An immutable set of entries from one discovery generation.
///
/// Never mutated structurally after construction; only the health fields of
/// its entries change.
#[derive(Debug)]
pub struct ServiceTable {
    generation: u64,
    source: TableSource,
    entries: HashMap<String, Arc<ServiceEntry>>,
}

impl Default for ServiceTable {
    fn default() -> Self {
        Self {
            generation: 0,
            source: TableSource::Empty,
            entries: HashMap::new(),
        }
    }
}

impl ServiceTable {
    /// Build a table with every entry seeded healthy.
    pub fn new(generation: u64, source: TableSource, services: &ServiceMap) -> Self {
        let entries = services
            .iter()
            .map(|(name, url)| (name.clone(), Arc::new(ServiceEntry::new(name.clone(), url.clone()))))
            .collect();

        Self {
            generation,
            source,
            entries,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> TableSource {
        self.source
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ServiceEntry>> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<ServiceEntry>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.entries().filter(|e| e.health().is_healthy()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn directory() -> ServiceMap {
        [("fleet", "http://fleet:3002"), ("auth", "http://auth:3001")]
            .into_iter()
            .map(|(n, a)| (n.to_string(), Url::parse(a).unwrap()))
            .collect()
    }

    #[test]
    fn new_table_is_seeded_healthy() {
        let table = ServiceTable::new(1, TableSource::Discovery, &directory());
        assert_eq!(table.len(), 2);
        assert_eq!(table.healthy_count(), 2);
        assert!(table.get("fleet").unwrap().status().last_checked_at.is_none());
    }

    #[test]
    fn status_reflects_probe_results() {
        let table = ServiceTable::new(1, TableSource::Discovery, &directory());
        let fleet = table.get("fleet").unwrap();
        fleet.health().mark_success(Duration::from_millis(7), 1);

        let status = fleet.status();
        assert!(status.healthy);
        assert_eq!(status.address, "http://fleet:3002/");
        assert_eq!(status.response_time_ms, Some(7));
        assert!(status.last_checked_at.is_some());
    }

    #[test]
    fn default_table_is_empty() {
        let table = ServiceTable::default();
        assert!(table.is_empty());
        assert_eq!(table.source(), TableSource::Empty);
        assert_eq!(table.generation(), 0);
    }
}
