//! Pantry configuration
//!
//! Parses `pantry.toml`-style configuration into a [`PantryConfig`].
//!
//! # Format
//!
//! ```toml
//! dev = true
//! environment = "client"     # or "server"
//! global_property = "$pantry"
//! ```
//!
//! Every field is optional; missing fields take their [`Default`] value.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the host global property a pantry is exposed under by default
pub const DEFAULT_GLOBAL_PROPERTY: &str = "$pantry";

/// Errors from configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where the application is executing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Interactive client (developer tooling may attach)
    #[default]
    Client,
    /// Server-side rendering, one pantry per request
    Server,
}

impl Environment {
    /// Check if running on the client
    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client)
    }
}

/// Configuration for a pantry instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PantryConfig {
    /// Development build: enables developer tooling hooks
    pub dev: bool,
    /// Execution environment
    pub environment: Environment,
    /// Host global property the pantry is published under
    pub global_property: String,
}

impl Default for PantryConfig {
    fn default() -> Self {
        Self {
            dev: cfg!(debug_assertions),
            environment: Environment::Client,
            global_property: DEFAULT_GLOBAL_PROPERTY.to_string(),
        }
    }
}

impl PantryConfig {
    /// Development configuration (client, tooling enabled)
    pub fn development() -> Self {
        Self {
            dev: true,
            ..Default::default()
        }
    }

    /// Server-rendering configuration (tooling never attaches)
    pub fn server() -> Self {
        Self {
            dev: false,
            environment: Environment::Server,
            ..Default::default()
        }
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Whether developer tooling should be wired on install
    pub fn devtools_enabled(&self) -> bool {
        self.dev && self.environment.is_client()
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.global_property.trim().is_empty() {
            return Err(ConfigError::Validation(
                "global_property must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
