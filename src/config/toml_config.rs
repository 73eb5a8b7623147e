use crate::config::settings::ConnectionSettings;
use crate::utils::error::{BridgeError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/azure.toml";

/// Layered configuration for disks and queue connections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Lowest layer, shared by every disk and connection.
    pub credentials: ConnectionSettings,
    /// Defaults for the `azure` queue connector.
    pub queue: ConnectionSettings,
    pub storage: StorageConfig,
    pub disks: BTreeMap<String, ConnectionSettings>,
    pub connections: BTreeMap<String, ConnectionSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Driver used by disks that do not name one.
    pub default: String,
    /// Per-driver defaults, keyed by `blob` or `file`.
    pub types: BTreeMap<String, ConnectionSettings>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default: "blob".to_string(),
            types: BTreeMap::new(),
        }
    }
}

impl AzureConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BridgeError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML after replacing `${VAR}` with the environment value.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        let config: AzureConfig = toml::from_str(&processed)?;
        config.validate()?;
        Ok(config)
    }

    /// Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BridgeError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn type_defaults(&self, driver: &str) -> ConnectionSettings {
        self.storage.types.get(driver).cloned().unwrap_or_default()
    }

    pub fn disk(&self, name: &str) -> Result<&ConnectionSettings> {
        self.disks
            .get(name)
            .ok_or_else(|| BridgeError::MissingConfigError {
                field: format!("disks.{}", name),
            })
    }

    pub fn connection(&self, name: &str) -> Result<&ConnectionSettings> {
        self.connections
            .get(name)
            .ok_or_else(|| BridgeError::MissingConfigError {
                field: format!("connections.{}", name),
            })
    }
}

impl Validate for AzureConfig {
    fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        self.queue.validate()?;

        for (name, settings) in &self.storage.types {
            if name != "blob" && name != "file" {
                return Err(BridgeError::InvalidConfigValueError {
                    field: "storage.types".to_string(),
                    value: name.clone(),
                    reason: "Storage type must be blob or file".to_string(),
                });
            }
            settings.validate()?;
        }

        for settings in self.disks.values().chain(self.connections.values()) {
            settings.validate()?;
        }
        Ok(())
    }
}
