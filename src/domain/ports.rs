use crate::domain::model::{
    BlobDownload, BlobListing, BlobProperties, ByteStream, FileDownload, FileEntry,
    FileProperties, ListBlobsOptions, QueueMessage, QueueMetadata, ShareItem, StreamedFile,
    UploadOptions, WriteOptions,
};
use crate::utils::error::{BridgeError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Filesystem contract consumed by application code.
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<FileEntry>;
    async fn write_stream(
        &self,
        path: &str,
        stream: ByteStream,
        options: &WriteOptions,
    ) -> Result<FileEntry>;
    async fn update(&self, path: &str, contents: Bytes, options: &WriteOptions)
        -> Result<FileEntry>;
    async fn update_stream(
        &self,
        path: &str,
        stream: ByteStream,
        options: &WriteOptions,
    ) -> Result<FileEntry>;

    async fn read(&self, path: &str) -> Result<FileEntry>;
    async fn read_stream(&self, path: &str) -> Result<StreamedFile>;

    async fn rename(&self, path: &str, new_path: &str) -> Result<bool>;
    async fn copy(&self, path: &str, new_path: &str) -> Result<bool>;
    async fn delete(&self, path: &str) -> Result<bool>;

    async fn create_dir(&self, dirname: &str, options: &WriteOptions) -> Result<FileEntry>;
    async fn delete_dir(&self, dirname: &str) -> Result<bool>;

    async fn has(&self, path: &str) -> Result<bool>;
    async fn list_contents(&self, directory: &str, recursive: bool) -> Result<Vec<FileEntry>>;

    async fn get_metadata(&self, path: &str) -> Result<FileEntry>;

    async fn get_size(&self, path: &str) -> Result<FileEntry> {
        self.get_metadata(path).await
    }

    async fn get_mimetype(&self, path: &str) -> Result<FileEntry> {
        self.get_metadata(path).await
    }

    async fn get_timestamp(&self, path: &str) -> Result<FileEntry> {
        self.get_metadata(path).await
    }

    async fn get_visibility(&self, _path: &str) -> Result<Visibility> {
        Err(BridgeError::Unsupported {
            operation: "get_visibility".to_string(),
        })
    }

    async fn set_visibility(&self, _path: &str, _visibility: Visibility) -> Result<FileEntry> {
        Err(BridgeError::Unsupported {
            operation: "set_visibility".to_string(),
        })
    }
}

/// Queue contract consumed by the worker loop.
#[async_trait]
pub trait Queue: Send + Sync {
    async fn size(&self, queue: Option<&str>) -> Result<u64>;
    async fn push(&self, job: &serde_json::Value, queue: Option<&str>) -> Result<()>;
    async fn push_raw(&self, payload: &str, queue: Option<&str>) -> Result<()>;
    async fn later(
        &self,
        delay: Duration,
        job: &serde_json::Value,
        queue: Option<&str>,
    ) -> Result<()>;
    async fn pop(&self, queue: Option<&str>) -> Result<Option<Box<dyn Job>>>;
}

/// One in-flight message.
#[async_trait]
pub trait Job: Send + Sync {
    fn job_id(&self) -> &str;
    fn raw_body(&self) -> Result<String>;
    fn attempts(&self) -> u32;
    fn queue(&self) -> &str;
    /// Lease length the message was popped with.
    fn visibility_timeout(&self) -> Duration;

    async fn delete(&mut self) -> Result<()>;
    async fn release(&mut self, delay: Duration) -> Result<()>;

    fn is_deleted(&self) -> bool;
    fn is_released(&self) -> bool;

    fn is_deleted_or_released(&self) -> bool {
        self.is_deleted() || self.is_released()
    }
}

/// Blob service operations the blob adapter relies on.
#[async_trait]
pub trait BlobService: Send + Sync {
    async fn create_container(&self, container: &str) -> Result<()>;
    /// Returns the blob's new last-modified time.
    async fn create_block_blob(
        &self,
        container: &str,
        blob: &str,
        content: Bytes,
        options: &UploadOptions,
    ) -> Result<DateTime<Utc>>;
    async fn get_blob(&self, container: &str, blob: &str) -> Result<BlobDownload>;
    async fn get_blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties>;
    async fn get_blob_metadata(&self, container: &str, blob: &str)
        -> Result<HashMap<String, String>>;
    async fn copy_blob(
        &self,
        dest_container: &str,
        dest_blob: &str,
        source_container: &str,
        source_blob: &str,
    ) -> Result<()>;
    async fn delete_blob(&self, container: &str, blob: &str) -> Result<()>;
    async fn list_blobs(&self, container: &str, options: &ListBlobsOptions) -> Result<BlobListing>;
}

/// File (share) service operations the file adapter relies on.
#[async_trait]
pub trait FileService: Send + Sync {
    async fn create_share(&self, share: &str) -> Result<()>;
    async fn create_directory(&self, share: &str, path: &str) -> Result<()>;
    async fn delete_directory(&self, share: &str, path: &str) -> Result<()>;
    async fn create_file_from_content(
        &self,
        share: &str,
        path: &str,
        content: Bytes,
        options: &UploadOptions,
    ) -> Result<()>;
    async fn get_file(&self, share: &str, path: &str) -> Result<FileDownload>;
    async fn get_file_properties(&self, share: &str, path: &str) -> Result<FileProperties>;
    async fn get_file_metadata(&self, share: &str, path: &str) -> Result<HashMap<String, String>>;
    async fn copy_file(&self, share: &str, dest_path: &str, source_path: &str) -> Result<()>;
    async fn delete_file(&self, share: &str, path: &str) -> Result<()>;
    /// Direct children of `directory` (empty string for the share root).
    async fn list_directories_and_files(
        &self,
        share: &str,
        directory: &str,
    ) -> Result<Vec<ShareItem>>;
}

/// Queue service operations the queue adapter and jobs rely on.
#[async_trait]
pub trait QueueService: Send + Sync {
    async fn create_queue(&self, queue: &str) -> Result<()>;
    async fn create_message(
        &self,
        queue: &str,
        text: &str,
        visibility_delay: Option<Duration>,
    ) -> Result<()>;
    async fn list_messages(
        &self,
        queue: &str,
        number_of_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>>;
    async fn delete_message(&self, queue: &str, message_id: &str, pop_receipt: &str)
        -> Result<()>;
    /// Changes the visibility timeout in place; returns the new pop receipt.
    async fn update_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
        visibility_timeout: Duration,
    ) -> Result<String>;
    async fn get_queue_metadata(&self, queue: &str) -> Result<QueueMetadata>;
}
