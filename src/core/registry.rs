use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::adapters::{AzureBlobStorage, AzureFileStorage, AzureQueue};
use crate::client::{BlobRestClient, FileRestClient, QueueRestClient};
use crate::config::{AzureConfig, ConnectionSettings};
use crate::domain::ports::{BlobService, FileService, Filesystem, Queue, QueueService};
use crate::utils::error::{BridgeError, Result};
use crate::utils::validation::validate_required_field;

pub const BLOB_DRIVER: &str = "blob";
pub const FILE_DRIVER: &str = "file";
pub const AZURE_CONNECTOR: &str = "azure";

pub type DriverFactory =
    Arc<dyn Fn(&AzureConfig, &ConnectionSettings) -> Result<Arc<dyn Filesystem>> + Send + Sync>;

/// Settings for a `blob` or `file` disk, lowest layer first:
/// `auto_create_<subject> = false`, credentials, type defaults, the disk.
pub fn storage_settings(
    config: &AzureConfig,
    driver: &str,
    disk: &ConnectionSettings,
) -> ConnectionSettings {
    let base = match driver {
        BLOB_DRIVER => ConnectionSettings {
            auto_create_container: Some(false),
            ..Default::default()
        },
        FILE_DRIVER => ConnectionSettings {
            auto_create_share: Some(false),
            ..Default::default()
        },
        _ => ConnectionSettings::default(),
    };
    let types = config.type_defaults(driver);

    ConnectionSettings::merge([&base, &config.credentials, &types, disk])
}

pub fn blob_storage(
    client: Arc<dyn BlobService>,
    settings: &ConnectionSettings,
) -> Result<AzureBlobStorage> {
    let container = validate_required_field("container", &settings.container)?;
    Ok(AzureBlobStorage::new(
        client,
        container.clone(),
        settings.auto_create_container.unwrap_or(false),
    ))
}

pub fn file_storage(
    client: Arc<dyn FileService>,
    settings: &ConnectionSettings,
) -> Result<AzureFileStorage> {
    let share = validate_required_field("share", &settings.share)?;
    Ok(AzureFileStorage::new(
        client,
        share.clone(),
        settings.auto_create_share.unwrap_or(false),
    ))
}

fn blob_driver(config: &AzureConfig, disk: &ConnectionSettings) -> Result<Arc<dyn Filesystem>> {
    let settings = storage_settings(config, BLOB_DRIVER, disk);
    let client = BlobRestClient::from_connection_string(
        &settings.connection_string()?,
        settings.request_timeout(),
    )?;
    Ok(Arc::new(blob_storage(Arc::new(client), &settings)?))
}

fn file_driver(config: &AzureConfig, disk: &ConnectionSettings) -> Result<Arc<dyn Filesystem>> {
    let settings = storage_settings(config, FILE_DRIVER, disk);
    let client = FileRestClient::from_connection_string(
        &settings.connection_string()?,
        settings.request_timeout(),
    )?;
    Ok(Arc::new(file_storage(Arc::new(client), &settings)?))
}

/// Named filesystem drivers and the disks built from them.
pub struct FilesystemManager {
    config: AzureConfig,
    drivers: HashMap<String, DriverFactory>,
    disks: Mutex<HashMap<String, Arc<dyn Filesystem>>>,
}

impl FilesystemManager {
    pub fn new(config: AzureConfig) -> Self {
        Self {
            config,
            drivers: HashMap::new(),
            disks: Mutex::new(HashMap::new()),
        }
    }

    /// Manager with the `blob` and `file` REST drivers registered.
    pub fn with_azure_drivers(config: AzureConfig) -> Self {
        let mut manager = Self::new(config);
        manager.extend(BLOB_DRIVER, blob_driver);
        manager.extend(FILE_DRIVER, file_driver);
        manager
    }

    pub fn config(&self) -> &AzureConfig {
        &self.config
    }

    pub fn extend<F>(&mut self, driver: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&AzureConfig, &ConnectionSettings) -> Result<Arc<dyn Filesystem>>
            + Send
            + Sync
            + 'static,
    {
        self.drivers.insert(driver.into(), Arc::new(factory));
        self
    }

    pub fn has_driver(&self, driver: &str) -> bool {
        self.drivers.contains_key(driver)
    }

    /// The disk configured under `[disks.<name>]`, built once and cached.
    pub async fn disk(&self, name: &str) -> Result<Arc<dyn Filesystem>> {
        let mut disks = self.disks.lock().await;
        if let Some(disk) = disks.get(name) {
            return Ok(disk.clone());
        }

        let settings = self.config.disk(name)?;
        let driver = settings
            .driver
            .clone()
            .unwrap_or_else(|| self.config.storage.default.clone());

        tracing::debug!("Building disk {} with driver {}", name, driver);
        let disk = self.build(&driver, settings)?;
        disks.insert(name.to_string(), disk.clone());
        Ok(disk)
    }

    /// Builds an uncached filesystem; `overrides` win over every
    /// configured layer.
    pub fn build(&self, driver: &str, overrides: &ConnectionSettings) -> Result<Arc<dyn Filesystem>> {
        let factory = self
            .drivers
            .get(driver)
            .ok_or_else(|| BridgeError::ConfigError {
                message: format!("Driver [{}] is not supported.", driver),
            })?;
        factory(&self.config, overrides)
    }
}

/// Turns connection settings into a queue.
pub trait Connector: Send + Sync {
    fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn Queue>>;
}

pub struct AzureConnector {
    defaults: ConnectionSettings,
    client: Option<Arc<dyn QueueService>>,
}

impl AzureConnector {
    /// `default` in the defaults is taken as the default queue name.
    pub fn new(defaults: ConnectionSettings) -> Self {
        let mut defaults = defaults;
        if let Some(default) = defaults.default.take() {
            defaults.queue = Some(default);
        }
        Self {
            defaults,
            client: None,
        }
    }

    /// Connector that hands every queue the given service instead of a
    /// REST client.
    pub fn with_client(defaults: ConnectionSettings, client: Arc<dyn QueueService>) -> Self {
        Self {
            client: Some(client),
            ..Self::new(defaults)
        }
    }

    pub fn defaults(&self) -> &ConnectionSettings {
        &self.defaults
    }

    pub fn settings(&self, config: &ConnectionSettings) -> ConnectionSettings {
        let base = ConnectionSettings {
            auto_base64: Some(false),
            auto_create_queue: Some(false),
            ..Default::default()
        };
        ConnectionSettings::merge([&base, &self.defaults, config])
    }
}

impl Connector for AzureConnector {
    fn connect(&self, config: &ConnectionSettings) -> Result<Arc<dyn Queue>> {
        let settings = self.settings(config);
        let queue = validate_required_field("queue", &settings.queue)?;

        let client: Arc<dyn QueueService> = match &self.client {
            Some(client) => client.clone(),
            None => Arc::new(QueueRestClient::from_connection_string(
                &settings.connection_string()?,
                settings.request_timeout(),
            )?),
        };

        Ok(Arc::new(AzureQueue::new(
            client,
            queue.clone(),
            settings.timeout,
            settings.auto_base64.unwrap_or(false),
            settings.auto_create_queue.unwrap_or(false),
        )))
    }
}

/// Named connectors and the queue connections built from them.
pub struct QueueManager {
    config: AzureConfig,
    connectors: HashMap<String, Arc<dyn Connector>>,
    connections: Mutex<HashMap<String, Arc<dyn Queue>>>,
}

impl QueueManager {
    pub fn new(config: AzureConfig) -> Self {
        Self {
            config,
            connectors: HashMap::new(),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Manager with the `azure` connector registered; its defaults are the
    /// credentials overlaid with the `[queue]` section.
    pub fn with_azure_connector(config: AzureConfig) -> Self {
        let defaults = config.credentials.overlay(&config.queue);
        let mut manager = Self::new(config);
        manager.add_connector(AZURE_CONNECTOR, AzureConnector::new(defaults));
        manager
    }

    pub fn config(&self) -> &AzureConfig {
        &self.config
    }

    pub fn add_connector<C>(&mut self, name: impl Into<String>, connector: C) -> &mut Self
    where
        C: Connector + 'static,
    {
        self.connectors.insert(name.into(), Arc::new(connector));
        self
    }

    /// The connection configured under `[connections.<name>]`, cached.
    pub async fn connection(&self, name: &str) -> Result<Arc<dyn Queue>> {
        let mut connections = self.connections.lock().await;
        if let Some(queue) = connections.get(name) {
            return Ok(queue.clone());
        }

        let settings = self.config.connection(name)?;
        let driver = settings.driver.as_deref().unwrap_or(AZURE_CONNECTOR);
        let connector = self
            .connectors
            .get(driver)
            .ok_or_else(|| BridgeError::ConfigError {
                message: format!("No connector for [{}]", driver),
            })?;

        tracing::debug!("Connecting queue {} with connector {}", name, driver);
        let queue = connector.connect(settings)?;
        connections.insert(name.to_string(), queue.clone());
        Ok(queue)
    }
}
