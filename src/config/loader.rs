//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::schema::{DirectoryConfig, GatewayConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::discovery::parse_address;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate gateway configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = read_toml(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load the directory published by the discovery registry.
pub fn load_directory(path: &Path) -> Result<DirectoryConfig, ConfigError> {
    let directory: DirectoryConfig = read_toml(path)?;

    let errors: Vec<_> = directory
        .services
        .iter()
        .filter(|(_, address)| parse_address(address).is_err())
        .map(|(name, address)| ValidationError::FallbackAddress {
            name: name.clone(),
            address: address.clone(),
        })
        .collect();

    if errors.is_empty() {
        Ok(directory)
    } else {
        Err(ConfigError::Validation(errors))
    }
}
