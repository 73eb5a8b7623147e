// Vendor side: Azure Storage REST clients and their in-memory stand-ins.

pub mod auth;
pub mod blob;
pub mod connection;
pub mod file;
pub mod http;
pub mod memory;
pub mod queue;
pub mod xml;

pub use blob::BlobRestClient;
pub use connection::{build_connection_string, ServiceKind, StorageAccount};
pub use file::FileRestClient;
pub use memory::{MemoryBlobService, MemoryFileService, MemoryQueueService};
pub use queue::QueueRestClient;
