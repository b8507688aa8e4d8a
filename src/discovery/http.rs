//! Remote discovery registry client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DiscoveryConfig;
use crate::discovery::{parse_directory, DiscoveryError, DiscoverySource, ServiceMap};

/// Fetches the directory from a discovery registry over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDiscovery {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpDiscovery {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(DiscoveryError::Transport)?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn from_config(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        Self::new(config.url.clone(), config.timeout())
    }

    fn map_transport(&self, e: reqwest::Error) -> DiscoveryError {
        if e.is_timeout() {
            DiscoveryError::Timeout(self.timeout)
        } else {
            DiscoveryError::Transport(e)
        }
    }
}

#[async_trait]
impl DiscoverySource for HttpDiscovery {
    async fn list_services(&self) -> Result<ServiceMap, DiscoveryError> {
        tracing::debug!(url = %self.url, "Fetching service directory");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.map_transport(e))?;
        let raw: BTreeMap<String, String> = serde_json::from_slice(&body)
            .map_err(|e| DiscoveryError::InvalidPayload(e.to_string()))?;

        parse_directory(raw)
    }
}
