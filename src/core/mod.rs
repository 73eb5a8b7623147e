pub mod registry;

pub use registry::{
    AzureConnector, Connector, DriverFactory, FilesystemManager, QueueManager, AZURE_CONNECTOR,
    BLOB_DRIVER, FILE_DRIVER,
};
