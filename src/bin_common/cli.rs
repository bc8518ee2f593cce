//! CLI utilities for binaries
//!
//! Handles configuration loading and environment variables
//! for all binary executables.

use std::path::{Path, PathBuf};
use thiserror::Error;
use wwks_link::{ClientConfig, LinkError, PickupClient};

/// Errors raised while assembling a binary's configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid client configuration: {0}")]
    Invalid(#[from] LinkError),

    #[error("Environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("Environment variable {name} has an invalid value '{value}'")]
    InvalidVar { name: &'static str, value: String },
}

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Robot link configuration (config/pickup.yaml)
    Pickup,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Pickup => "config/pickup.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        "PICKUP_CONFIG_PATH"
    }
}

/// Load configuration path from environment or use default
///
/// A `Custom` path always wins over the environment.
///
/// # Examples
/// ```
/// use rowa_pickup::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Custom("link.yaml".into()));
/// assert_eq!(path.to_str(), Some("link.yaml"));
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    if let ConfigType::Custom(path) = &config_type {
        return PathBuf::from(path);
    }
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Read and validate a [`ClientConfig`] from a YAML file
///
/// Missing fields take their protocol defaults.
pub fn load_client_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: ClientConfig = if text.trim().is_empty() {
        ClientConfig::default()
    } else {
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };

    config.validate()?;
    Ok(config)
}

/// Where the robot is and who this terminal is, taken from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// `ROBOT_HOST` (required, IP literal)
    pub host: String,
    /// `ROBOT_PORT` (required)
    pub port: i32,
    /// `SOURCE_NUMBER`, the subscriber id announced in the handshake
    pub source_number: Option<u32>,
    /// `TENANT_ID`
    pub tenant_id: Option<String>,
    /// `STOCK_LOCATION`
    pub stock_location: Option<String>,
}

impl LinkSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, treating empty values as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("ROBOT_HOST").ok_or(ConfigError::MissingVar("ROBOT_HOST"))?;
        if !PickupClient::is_valid_ip_address(&host) {
            return Err(ConfigError::InvalidVar {
                name: "ROBOT_HOST",
                value: host,
            });
        }

        let raw_port = get("ROBOT_PORT").ok_or(ConfigError::MissingVar("ROBOT_PORT"))?;
        let port = raw_port
            .parse::<i32>()
            .ok()
            .filter(|p| PickupClient::is_valid_port(*p))
            .ok_or(ConfigError::InvalidVar {
                name: "ROBOT_PORT",
                value: raw_port.clone(),
            })?;

        let source_number = match get("SOURCE_NUMBER") {
            Some(raw) => Some(raw.parse::<u32>().map_err(|_| ConfigError::InvalidVar {
                name: "SOURCE_NUMBER",
                value: raw.clone(),
            })?),
            None => None,
        };

        Ok(Self {
            host,
            port,
            source_number,
            tenant_id: get("TENANT_ID"),
            stock_location: get("STOCK_LOCATION"),
        })
    }

    /// Overlay the terminal identity onto a loaded configuration
    pub fn apply(&self, config: ClientConfig) -> ClientConfig {
        let mut identity = config.identity.clone();
        if let Some(id) = self.source_number {
            identity = identity.with_subscriber_id(id);
        }
        if self.tenant_id.is_some() {
            identity = identity.with_tenant_id(self.tenant_id.clone());
        }
        if let Some(location) = &self.stock_location {
            identity = identity.with_stock_location_id(location.clone());
        }
        config.with_identity(identity)
    }
}
