use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{conflict, invalid_uri, not_found, single_chunk};
use crate::domain::model::{FileDownload, FileProperties, ShareItem, UploadOptions};
use crate::domain::ports::FileService;
use crate::utils::error::Result;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
struct StoredFile {
    content: Bytes,
    content_type: String,
    metadata: HashMap<String, String>,
    last_modified: DateTime<Utc>,
}

impl StoredFile {
    fn properties(&self) -> FileProperties {
        FileProperties {
            last_modified: self.last_modified,
            content_length: self.content.len() as u64,
            content_type: Some(self.content_type.clone()),
        }
    }
}

#[derive(Debug, Default)]
struct Share {
    directories: BTreeSet<String>,
    files: BTreeMap<String, StoredFile>,
}

impl Share {
    fn has_directory(&self, path: &str) -> bool {
        path.is_empty() || self.directories.contains(path)
    }

    fn require_parent(&self, path: &str) -> Result<()> {
        if self.has_directory(parent_of(path)) {
            Ok(())
        } else {
            Err(not_found("ParentNotFound"))
        }
    }

    fn file(&self, path: &str) -> Result<&StoredFile> {
        self.files
            .get(path)
            .ok_or_else(|| not_found("ResourceNotFound"))
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// The REST service sees `/a.txt` as `share//a.txt`; reject it the same way.
fn checked(path: &str) -> Result<&str> {
    if path.starts_with('/') || path.ends_with('/') || path.contains("//") {
        return Err(invalid_uri());
    }
    Ok(path)
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFileService {
    shares: Arc<Mutex<HashMap<String, Share>>>,
}

impl MemoryFileService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shares(names: &[&str]) -> Self {
        let shares = names
            .iter()
            .map(|name| (name.to_string(), Share::default()))
            .collect();
        Self {
            shares: Arc::new(Mutex::new(shares)),
        }
    }

    pub async fn share_exists(&self, share: &str) -> bool {
        self.shares.lock().await.contains_key(share)
    }

    pub async fn directory_exists(&self, share: &str, path: &str) -> bool {
        self.shares
            .lock()
            .await
            .get(share)
            .map(|s| s.has_directory(path))
            .unwrap_or(false)
    }
}

#[async_trait]
impl FileService for MemoryFileService {
    async fn create_share(&self, share: &str) -> Result<()> {
        let mut shares = self.shares.lock().await;
        if shares.contains_key(share) {
            return Err(conflict("ShareAlreadyExists"));
        }
        shares.insert(share.to_string(), Share::default());
        Ok(())
    }

    async fn create_directory(&self, share: &str, path: &str) -> Result<()> {
        let path = checked(path)?;
        let mut shares = self.shares.lock().await;
        let share = shares
            .get_mut(share)
            .ok_or_else(|| not_found("ShareNotFound"))?;
        share.require_parent(path)?;
        if share.has_directory(path) {
            return Err(conflict("ResourceAlreadyExists"));
        }
        share.directories.insert(path.to_string());
        Ok(())
    }

    async fn delete_directory(&self, share: &str, path: &str) -> Result<()> {
        let path = checked(path)?;
        let mut shares = self.shares.lock().await;
        let share = shares
            .get_mut(share)
            .ok_or_else(|| not_found("ShareNotFound"))?;
        if !share.directories.contains(path) {
            return Err(not_found("ResourceNotFound"));
        }
        let occupied = share.directories.iter().any(|d| parent_of(d) == path)
            || share.files.keys().any(|f| parent_of(f) == path);
        if occupied {
            return Err(conflict("DirectoryNotEmpty"));
        }
        share.directories.remove(path);
        Ok(())
    }

    async fn create_file_from_content(
        &self,
        share: &str,
        path: &str,
        content: Bytes,
        options: &UploadOptions,
    ) -> Result<()> {
        let path = checked(path)?;
        let mut shares = self.shares.lock().await;
        let share = shares
            .get_mut(share)
            .ok_or_else(|| not_found("ShareNotFound"))?;
        share.require_parent(path)?;
        share.files.insert(
            path.to_string(),
            StoredFile {
                content,
                content_type: options
                    .content_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
                metadata: options.metadata.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_file(&self, share: &str, path: &str) -> Result<FileDownload> {
        let shares = self.shares.lock().await;
        let share = shares.get(share).ok_or_else(|| not_found("ShareNotFound"))?;
        let stored = share.file(checked(path)?)?;
        Ok(FileDownload {
            properties: stored.properties(),
            body: single_chunk(stored.content.clone()),
        })
    }

    async fn get_file_properties(&self, share: &str, path: &str) -> Result<FileProperties> {
        let shares = self.shares.lock().await;
        let share = shares.get(share).ok_or_else(|| not_found("ShareNotFound"))?;
        Ok(share.file(checked(path)?)?.properties())
    }

    async fn get_file_metadata(&self, share: &str, path: &str) -> Result<HashMap<String, String>> {
        let shares = self.shares.lock().await;
        let share = shares.get(share).ok_or_else(|| not_found("ShareNotFound"))?;
        Ok(share.file(checked(path)?)?.metadata.clone())
    }

    async fn copy_file(&self, share: &str, dest_path: &str, source_path: &str) -> Result<()> {
        let dest_path = checked(dest_path)?;
        let mut shares = self.shares.lock().await;
        let share = shares
            .get_mut(share)
            .ok_or_else(|| not_found("ShareNotFound"))?;
        let mut copy = share.file(checked(source_path)?)?.clone();
        share.require_parent(dest_path)?;
        copy.last_modified = Utc::now();
        share.files.insert(dest_path.to_string(), copy);
        Ok(())
    }

    async fn delete_file(&self, share: &str, path: &str) -> Result<()> {
        let mut shares = self.shares.lock().await;
        let share = shares
            .get_mut(share)
            .ok_or_else(|| not_found("ShareNotFound"))?;
        share
            .files
            .remove(checked(path)?)
            .map(|_| ())
            .ok_or_else(|| not_found("ResourceNotFound"))
    }

    async fn list_directories_and_files(
        &self,
        share: &str,
        directory: &str,
    ) -> Result<Vec<ShareItem>> {
        let directory = checked(directory)?;
        let shares = self.shares.lock().await;
        let share = shares.get(share).ok_or_else(|| not_found("ShareNotFound"))?;
        if !share.has_directory(directory) {
            return Err(not_found("ResourceNotFound"));
        }

        let name_in = |path: &str| -> Option<String> {
            if parent_of(path) != directory {
                return None;
            }
            Some(path.rsplit('/').next().unwrap_or(path).to_string())
        };

        let mut items: Vec<ShareItem> = share
            .directories
            .iter()
            .filter_map(|d| name_in(d).map(|name| ShareItem::Directory { name }))
            .collect();
        items.extend(share.files.iter().filter_map(|(path, stored)| {
            name_in(path).map(|name| ShareItem::File {
                name,
                content_length: stored.content.len() as u64,
            })
        }));
        Ok(items)
    }
}
