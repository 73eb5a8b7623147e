pub mod adapters;
pub mod client;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{AzureBlobStorage, AzureFileStorage, AzureJob, AzureQueue};
pub use config::{AzureConfig, ConnectionSettings};
pub use core::{AzureConnector, Connector, FilesystemManager, QueueManager};
pub use domain::model::{EntryType, FileEntry, QueueMessage, StreamedFile, WriteOptions};
pub use domain::ports::{Filesystem, Job, Queue};
pub use utils::error::{BridgeError, Result};
