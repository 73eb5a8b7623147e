use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{conflict, not_found, single_chunk};
use crate::domain::model::{
    BlobDownload, BlobItem, BlobListing, BlobProperties, ListBlobsOptions, UploadOptions,
};
use crate::domain::ports::BlobService;
use crate::utils::error::Result;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
struct StoredBlob {
    content: Bytes,
    content_type: String,
    metadata: HashMap<String, String>,
    last_modified: DateTime<Utc>,
}

impl StoredBlob {
    fn properties(&self) -> BlobProperties {
        BlobProperties {
            last_modified: self.last_modified,
            content_length: self.content.len() as u64,
            content_type: Some(self.content_type.clone()),
        }
    }
}

type Containers = HashMap<String, BTreeMap<String, StoredBlob>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryBlobService {
    containers: Arc<Mutex<Containers>>,
}

impl MemoryBlobService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_containers(names: &[&str]) -> Self {
        let containers = names
            .iter()
            .map(|name| (name.to_string(), BTreeMap::new()))
            .collect();
        Self {
            containers: Arc::new(Mutex::new(containers)),
        }
    }

    pub async fn container_exists(&self, container: &str) -> bool {
        self.containers.lock().await.contains_key(container)
    }

    pub async fn blob_names(&self, container: &str) -> Vec<String> {
        self.containers
            .lock()
            .await
            .get(container)
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn stored(&self, container: &str, blob: &str) -> Result<StoredBlob> {
        let containers = self.containers.lock().await;
        let blobs = containers
            .get(container)
            .ok_or_else(|| not_found("ContainerNotFound"))?;
        blobs
            .get(blob)
            .cloned()
            .ok_or_else(|| not_found("BlobNotFound"))
    }
}

#[async_trait]
impl BlobService for MemoryBlobService {
    async fn create_container(&self, container: &str) -> Result<()> {
        let mut containers = self.containers.lock().await;
        if containers.contains_key(container) {
            return Err(conflict("ContainerAlreadyExists"));
        }
        containers.insert(container.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn create_block_blob(
        &self,
        container: &str,
        blob: &str,
        content: Bytes,
        options: &UploadOptions,
    ) -> Result<DateTime<Utc>> {
        let mut containers = self.containers.lock().await;
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| not_found("ContainerNotFound"))?;
        let last_modified = Utc::now();
        blobs.insert(
            blob.to_string(),
            StoredBlob {
                content,
                content_type: options
                    .content_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
                metadata: options.metadata.clone(),
                last_modified,
            },
        );
        Ok(last_modified)
    }

    async fn get_blob(&self, container: &str, blob: &str) -> Result<BlobDownload> {
        let stored = self.stored(container, blob).await?;
        Ok(BlobDownload {
            properties: stored.properties(),
            body: single_chunk(stored.content),
        })
    }

    async fn get_blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties> {
        Ok(self.stored(container, blob).await?.properties())
    }

    async fn get_blob_metadata(
        &self,
        container: &str,
        blob: &str,
    ) -> Result<HashMap<String, String>> {
        Ok(self.stored(container, blob).await?.metadata)
    }

    async fn copy_blob(
        &self,
        dest_container: &str,
        dest_blob: &str,
        source_container: &str,
        source_blob: &str,
    ) -> Result<()> {
        let mut copy = self.stored(source_container, source_blob).await?;
        copy.last_modified = Utc::now();

        let mut containers = self.containers.lock().await;
        let blobs = containers
            .get_mut(dest_container)
            .ok_or_else(|| not_found("ContainerNotFound"))?;
        blobs.insert(dest_blob.to_string(), copy);
        Ok(())
    }

    async fn delete_blob(&self, container: &str, blob: &str) -> Result<()> {
        let mut containers = self.containers.lock().await;
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| not_found("ContainerNotFound"))?;
        blobs
            .remove(blob)
            .map(|_| ())
            .ok_or_else(|| not_found("BlobNotFound"))
    }

    async fn list_blobs(&self, container: &str, options: &ListBlobsOptions) -> Result<BlobListing> {
        let containers = self.containers.lock().await;
        let blobs = containers
            .get(container)
            .ok_or_else(|| not_found("ContainerNotFound"))?;

        let mut listing = BlobListing::default();
        for (name, stored) in blobs.range(options.prefix.clone()..) {
            let Some(rest) = name.strip_prefix(options.prefix.as_str()) else {
                break;
            };

            let grouped = options
                .delimiter
                .as_deref()
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|idx| idx + d.len()));

            match grouped {
                Some(end) => {
                    let prefix = format!("{}{}", options.prefix, &rest[..end]);
                    if listing.prefixes.last() != Some(&prefix) {
                        listing.prefixes.push(prefix);
                    }
                }
                None => listing.blobs.push(BlobItem {
                    name: name.clone(),
                    properties: stored.properties(),
                }),
            }
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_container_is_not_found() {
        let service = MemoryBlobService::new();
        let err = service
            .create_block_blob("c1", "a.txt", Bytes::from_static(b"x"), &UploadOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.error_code(), Some("ContainerNotFound"));
    }

    #[tokio::test]
    async fn test_delimiter_groups_prefixes() {
        let service = MemoryBlobService::with_containers(&["c1"]);
        for name in ["foo/a.txt", "foo/sub/b.txt", "foo/sub/c.txt", "other.txt"] {
            service
                .create_block_blob("c1", name, Bytes::from_static(b"x"), &UploadOptions::default())
                .await
                .unwrap();
        }

        let listing = service
            .list_blobs(
                "c1",
                &ListBlobsOptions {
                    prefix: "foo/".to_string(),
                    delimiter: Some("/".to_string()),
                },
            )
            .await
            .unwrap();

        let names: Vec<_> = listing.blobs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["foo/a.txt"]);
        assert_eq!(listing.prefixes, vec!["foo/sub/".to_string()]);
    }
}
