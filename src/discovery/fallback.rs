//! Static discovery source.
//!
//! Backs the built-in fallback table and gives tests a deterministic source.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::discovery::{parse_directory, DiscoveryError, DiscoverySource, ServiceMap};

/// A fixed directory that never changes.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    services: ServiceMap,
}

impl StaticDiscovery {
    /// Build from raw config entries, skipping unusable addresses.
    pub fn from_config(raw: &BTreeMap<String, String>) -> Result<Self, DiscoveryError> {
        let services = parse_directory(raw.iter().map(|(k, v)| (k.clone(), v.clone())))?;
        Ok(Self { services })
    }

    pub fn services(&self) -> &ServiceMap {
        &self.services
    }
}

#[async_trait]
impl DiscoverySource for StaticDiscovery {
    async fn list_services(&self) -> Result<ServiceMap, DiscoveryError> {
        if self.services.is_empty() {
            return Err(DiscoveryError::Empty);
        }
        Ok(self.services.clone())
    }
}
