use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::adapters::path::{
    collect_stream, dirname, emulate_directories, format_listing, normalize_dir, normalize_entry,
    normalize_path, upload_options,
};
use crate::domain::model::{
    BlobProperties, ByteStream, FileEntry, ListBlobsOptions, StreamedFile, WriteOptions,
};
use crate::domain::ports::{BlobService, Filesystem};
use crate::utils::error::Result;

/// Filesystem over one blob container.
#[derive(Clone)]
pub struct AzureBlobStorage {
    client: Arc<dyn BlobService>,
    container: String,
    auto_create_container: bool,
}

impl AzureBlobStorage {
    pub fn new(
        client: Arc<dyn BlobService>,
        container: impl Into<String>,
        auto_create_container: bool,
    ) -> Self {
        Self {
            client,
            container: container.into(),
            auto_create_container,
        }
    }

    pub fn client(&self) -> &Arc<dyn BlobService> {
        &self.client
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    async fn upload(
        &self,
        path: &str,
        contents: Bytes,
        options: &WriteOptions,
        keep_contents: bool,
    ) -> Result<FileEntry> {
        let path = normalize_path(path)?;
        self.upload_normalized(path, contents, options, keep_contents).await
    }

    async fn upload_normalized(
        &self,
        path: String,
        contents: Bytes,
        options: &WriteOptions,
        keep_contents: bool,
    ) -> Result<FileEntry> {
        let upload = upload_options(&path, options);

        let first = self
            .client
            .create_block_blob(&self.container, &path, contents.clone(), &upload)
            .await;

        let last_modified = match first {
            Ok(last_modified) => last_modified,
            Err(err) if err.is_not_found() && self.auto_create_container => {
                tracing::info!("Container {} not found, creating it", self.container);
                self.client.create_container(&self.container).await?;
                self.client
                    .create_block_blob(&self.container, &path, contents.clone(), &upload)
                    .await?
            }
            Err(err) => return Err(err),
        };

        tracing::debug!("Uploaded {}/{} ({} bytes)", self.container, path, contents.len());

        let mut entry = FileEntry::file(path.clone(), dirname(&path));
        entry.timestamp = Some(last_modified.timestamp());
        if keep_contents {
            entry.contents = Some(contents);
        }
        Ok(entry)
    }

    fn entry_from_properties(path: &str, properties: &BlobProperties) -> FileEntry {
        if path.ends_with('/') {
            return FileEntry::dir(path);
        }

        FileEntry {
            timestamp: Some(properties.last_modified.timestamp()),
            mimetype: properties.content_type.clone(),
            size: Some(properties.content_length),
            ..FileEntry::file(path, dirname(path))
        }
    }

    fn entry_from_prefix(prefix: &str) -> FileEntry {
        FileEntry::dir(prefix.trim_end_matches('/'))
    }
}

#[async_trait]
impl Filesystem for AzureBlobStorage {
    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> Result<FileEntry> {
        self.upload(path, contents, options, true).await
    }

    async fn write_stream(
        &self,
        path: &str,
        stream: ByteStream,
        options: &WriteOptions,
    ) -> Result<FileEntry> {
        let contents = collect_stream(stream).await?;
        self.upload(path, contents, options, false).await
    }

    async fn update(
        &self,
        path: &str,
        contents: Bytes,
        options: &WriteOptions,
    ) -> Result<FileEntry> {
        self.upload(path, contents, options, true).await
    }

    async fn update_stream(
        &self,
        path: &str,
        stream: ByteStream,
        options: &WriteOptions,
    ) -> Result<FileEntry> {
        let contents = collect_stream(stream).await?;
        self.upload(path, contents, options, false).await
    }

    async fn read(&self, path: &str) -> Result<FileEntry> {
        let path = normalize_entry(path)?;
        let download = self.client.get_blob(&self.container, &path).await?;
        let mut entry = Self::entry_from_properties(&path, &download.properties);
        entry.contents = Some(collect_stream(download.body).await?);
        Ok(entry)
    }

    async fn read_stream(&self, path: &str) -> Result<StreamedFile> {
        let path = normalize_entry(path)?;
        let download = self.client.get_blob(&self.container, &path).await?;
        Ok(StreamedFile {
            entry: Self::entry_from_properties(&path, &download.properties),
            stream: download.body,
        })
    }

    async fn rename(&self, path: &str, new_path: &str) -> Result<bool> {
        self.copy(path, new_path).await?;
        self.delete(path).await
    }

    async fn copy(&self, path: &str, new_path: &str) -> Result<bool> {
        let (path, new_path) = (normalize_path(path)?, normalize_path(new_path)?);
        self.client
            .copy_blob(&self.container, &new_path, &self.container, &path)
            .await?;
        Ok(true)
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let path = normalize_entry(path)?;
        self.client.delete_blob(&self.container, &path).await?;
        Ok(true)
    }

    async fn create_dir(&self, dirname: &str, options: &WriteOptions) -> Result<FileEntry> {
        let dirname = normalize_dir(dirname)?;
        self.upload_normalized(dirname.clone(), Bytes::from_static(b" "), options, false)
            .await?;
        Ok(FileEntry::dir(dirname))
    }

    async fn delete_dir(&self, dirname: &str) -> Result<bool> {
        let options = ListBlobsOptions {
            prefix: normalize_dir(dirname)?,
            delimiter: None,
        };
        let listing = self.client.list_blobs(&self.container, &options).await?;

        for blob in listing.blobs {
            self.client.delete_blob(&self.container, &blob.name).await?;
        }
        Ok(true)
    }

    async fn has(&self, path: &str) -> Result<bool> {
        let path = normalize_entry(path)?;
        match self.client.get_blob_metadata(&self.container, &path).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn list_contents(&self, directory: &str, recursive: bool) -> Result<Vec<FileEntry>> {
        let directory = normalize_path(directory)?;
        let prefix = if directory.is_empty() {
            String::new()
        } else {
            format!("{}/", directory)
        };

        let options = ListBlobsOptions {
            prefix,
            delimiter: if recursive { None } else { Some("/".to_string()) },
        };
        let listing = self.client.list_blobs(&self.container, &options).await?;

        let mut contents: Vec<FileEntry> = listing
            .blobs
            .iter()
            .map(|blob| Self::entry_from_properties(&blob.name, &blob.properties))
            .collect();

        if !recursive {
            contents.extend(listing.prefixes.iter().map(|p| Self::entry_from_prefix(p)));
        }

        Ok(format_listing(&directory, recursive, emulate_directories(contents)))
    }

    async fn get_metadata(&self, path: &str) -> Result<FileEntry> {
        let path = normalize_entry(path)?;
        let properties = self
            .client
            .get_blob_properties(&self.container, &path)
            .await?;
        Ok(Self::entry_from_properties(&path, &properties))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryBlobService;

    #[tokio::test]
    async fn test_create_dir_writes_placeholder_blob() {
        let service = MemoryBlobService::with_containers(&["c1"]);
        let storage = AzureBlobStorage::new(Arc::new(service.clone()), "c1", false);

        let entry = storage
            .create_dir("/reports//2024", &WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(entry.path, "reports/2024/");
        assert!(entry.is_dir());
        assert_eq!(service.blob_names("c1").await, vec!["reports/2024/".to_string()]);
    }

    #[tokio::test]
    async fn test_placeholder_metadata_is_a_directory() {
        let service = MemoryBlobService::with_containers(&["c1"]);
        let storage = AzureBlobStorage::new(Arc::new(service), "c1", false);
        storage.create_dir("docs", &WriteOptions::default()).await.unwrap();

        let entry = storage.get_metadata("docs/").await.unwrap();
        assert!(entry.is_dir());
        assert_eq!(entry.size, None);
    }
}
