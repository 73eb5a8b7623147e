// Host contracts implemented on top of the storage service traits.

pub mod blob;
pub mod file;
pub mod job;
pub mod path;
pub mod queue;

pub use blob::AzureBlobStorage;
pub use file::AzureFileStorage;
pub use job::AzureJob;
pub use queue::AzureQueue;
