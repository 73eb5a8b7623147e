use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::adapters::path::{
    collect_stream, dirname, format_listing, normalize_dir, normalize_path, upload_options,
};
use crate::domain::model::{
    ByteStream, FileEntry, FileProperties, ShareItem, StreamedFile, WriteOptions,
};
use crate::domain::ports::{FileService, Filesystem};
use crate::utils::error::{BridgeError, Result};

/// Filesystem over one file share. Directories are real service objects.
#[derive(Clone)]
pub struct AzureFileStorage {
    client: Arc<dyn FileService>,
    share: String,
    auto_create_share: bool,
}

fn ignore_existing(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.is_already_exists() => Ok(()),
        other => other,
    }
}

fn join(directory: &str, name: &str) -> String {
    if directory.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", directory, name)
    }
}

impl AzureFileStorage {
    pub fn new(
        client: Arc<dyn FileService>,
        share: impl Into<String>,
        auto_create_share: bool,
    ) -> Self {
        Self {
            client,
            share: share.into(),
            auto_create_share,
        }
    }

    pub fn client(&self) -> &Arc<dyn FileService> {
        &self.client
    }

    pub fn share(&self) -> &str {
        &self.share
    }

    /// Creates the share and every ancestor directory of `path`.
    async fn create_share_and_parents(&self, path: &str) -> Result<()> {
        tracing::info!("Share {} or parent of {} not found, creating it", self.share, path);
        ignore_existing(self.client.create_share(&self.share).await)?;

        let parent = dirname(path);
        let mut current = String::new();
        for segment in parent.split('/').filter(|s| !s.is_empty()) {
            current = join(&current, segment);
            ignore_existing(self.client.create_directory(&self.share, &current).await)?;
        }
        Ok(())
    }

    async fn upload(
        &self,
        path: &str,
        contents: Bytes,
        options: &WriteOptions,
        keep_contents: bool,
    ) -> Result<FileEntry> {
        let path = normalize_path(path)?;
        let upload = upload_options(&path, options);

        let first = self
            .client
            .create_file_from_content(&self.share, &path, contents.clone(), &upload)
            .await;

        match first {
            Ok(()) => {}
            Err(err) if err.is_not_found() && self.auto_create_share => {
                self.create_share_and_parents(&path).await?;
                self.client
                    .create_file_from_content(&self.share, &path, contents.clone(), &upload)
                    .await?;
            }
            Err(err) => return Err(err),
        }

        let properties = self.client.get_file_properties(&self.share, &path).await?;
        tracing::debug!("Uploaded {}/{} ({} bytes)", self.share, path, contents.len());

        let mut entry = FileEntry::file(path.clone(), dirname(&path));
        entry.timestamp = Some(properties.last_modified.timestamp());
        if keep_contents {
            entry.contents = Some(contents);
        }
        Ok(entry)
    }

    fn entry_from_properties(path: &str, properties: &FileProperties) -> FileEntry {
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

    fn entry_from_item(directory: &str, item: &ShareItem) -> FileEntry {
        let path = join(directory, item.name());
        match item {
            ShareItem::Directory { .. } => {
                let mut entry = FileEntry::dir(path);
                entry.dirname = Some(directory.to_string());
                entry
            }
            ShareItem::File { content_length, .. } => FileEntry {
                size: Some(*content_length),
                ..FileEntry::file(path, directory)
            },
        }
    }
}

#[async_trait]
impl Filesystem for AzureFileStorage {
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
        let path = normalize_path(path)?;
        let download = self.client.get_file(&self.share, &path).await?;
        let mut entry = Self::entry_from_properties(&path, &download.properties);
        entry.contents = Some(collect_stream(download.body).await?);
        Ok(entry)
    }

    async fn read_stream(&self, path: &str) -> Result<StreamedFile> {
        let path = normalize_path(path)?;
        let download = self.client.get_file(&self.share, &path).await?;
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
        self.client.copy_file(&self.share, &new_path, &path).await?;
        Ok(true)
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let path = normalize_path(path)?;
        self.client.delete_file(&self.share, &path).await?;
        Ok(true)
    }

    async fn create_dir(&self, dirname: &str, _options: &WriteOptions) -> Result<FileEntry> {
        let dirname = normalize_dir(dirname)?;
        self.client
            .create_directory(&self.share, dirname.trim_end_matches('/'))
            .await?;
        Ok(FileEntry::dir(dirname))
    }

    async fn delete_dir(&self, dirname: &str) -> Result<bool> {
        let dirname = normalize_path(dirname)?;
        self.client.delete_directory(&self.share, &dirname).await?;
        Ok(true)
    }

    async fn has(&self, path: &str) -> Result<bool> {
        let path = normalize_path(path)?;
        match self.client.get_file_metadata(&self.share, &path).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn list_contents(&self, directory: &str, recursive: bool) -> Result<Vec<FileEntry>> {
        if recursive {
            return Err(BridgeError::invalid_argument(
                "Recursive listing is not supported by file shares",
            ));
        }

        let directory = normalize_path(directory)?;
        let items = self
            .client
            .list_directories_and_files(&self.share, &directory)
            .await?;

        let contents = items
            .iter()
            .map(|item| Self::entry_from_item(&directory, item))
            .collect();

        Ok(format_listing(&directory, false, contents))
    }

    async fn get_metadata(&self, path: &str) -> Result<FileEntry> {
        let path = normalize_path(path)?;
        let properties = self.client.get_file_properties(&self.share, &path).await?;
        Ok(Self::entry_from_properties(&path, &properties))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryFileService;

    #[tokio::test]
    async fn test_auto_create_builds_share_and_parents() {
        let service = MemoryFileService::new();
        let storage = AzureFileStorage::new(Arc::new(service.clone()), "s1", true);

        let entry = storage
            .write("a/b/c.txt", Bytes::from_static(b"hi"), &WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(entry.path, "a/b/c.txt");
        assert_eq!(entry.dirname.as_deref(), Some("a/b"));
        assert!(service.share_exists("s1").await);
        assert!(service.directory_exists("s1", "a/b").await);
    }

    #[tokio::test]
    async fn test_missing_share_without_auto_create_fails() {
        let storage = AzureFileStorage::new(Arc::new(MemoryFileService::new()), "s1", false);
        let err = storage
            .write("x.txt", Bytes::from_static(b"hi"), &WriteOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_recursive_listing_is_rejected() {
        let storage =
            AzureFileStorage::new(Arc::new(MemoryFileService::with_shares(&["s1"])), "s1", false);
        let err = storage.list_contents("", true).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { .. }));
    }
}
