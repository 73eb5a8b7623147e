#[cfg(feature = "cli")]
pub mod cli;
pub mod settings;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command};
pub use settings::ConnectionSettings;
pub use toml_config::{AzureConfig, StorageConfig, DEFAULT_CONFIG_PATH};
