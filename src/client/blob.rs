use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::collections::HashMap;
use std::time::Duration;

use crate::client::connection::{ServiceKind, StorageAccount};
use crate::client::http::{self, RestTransport};
use crate::client::xml::{self, BlobEntry, BlobEnumerationResults};
use crate::domain::model::{
    BlobDownload, BlobItem, BlobListing, BlobProperties, ListBlobsOptions, UploadOptions,
};
use crate::domain::ports::BlobService;
use crate::utils::error::Result;

/// Blob service over the REST API.
#[derive(Debug, Clone)]
pub struct BlobRestClient {
    transport: RestTransport,
}

impl BlobRestClient {
    pub fn new(account: StorageAccount, timeout: Duration) -> Result<Self> {
        Ok(Self {
            transport: RestTransport::new(account, timeout)?,
        })
    }

    pub fn from_connection_string(connection_string: &str, timeout: Duration) -> Result<Self> {
        Self::new(StorageAccount::from_connection_string(connection_string)?, timeout)
    }

    fn properties(headers: &HeaderMap) -> Result<BlobProperties> {
        Ok(BlobProperties {
            last_modified: http::last_modified(headers)?,
            content_length: http::header_u64(headers, "content-length")?,
            content_type: http::header_string(headers, "content-type"),
        })
    }
}

#[async_trait]
impl BlobService for BlobRestClient {
    async fn create_container(&self, container: &str) -> Result<()> {
        let url = self
            .transport
            .url(ServiceKind::Blob, &[container], &[("restype", "container")])?;
        self.transport
            .send(Method::PUT, url, HeaderMap::new(), None)
            .await?;
        tracing::debug!("Created container {}", container);
        Ok(())
    }

    async fn create_block_blob(
        &self,
        container: &str,
        blob: &str,
        content: Bytes,
        options: &UploadOptions,
    ) -> Result<DateTime<Utc>> {
        let url = self.transport.url(ServiceKind::Blob, &[container, blob], &[])?;
        let mut headers = http::upload_headers(options, "x-ms-blob-")?;
        http::insert_header(&mut headers, "x-ms-blob-type", "BlockBlob")?;

        let response = self
            .transport
            .send(Method::PUT, url, headers, Some(content))
            .await?;
        http::last_modified(response.headers())
    }

    async fn get_blob(&self, container: &str, blob: &str) -> Result<BlobDownload> {
        let url = self.transport.url(ServiceKind::Blob, &[container, blob], &[])?;
        let response = self
            .transport
            .send(Method::GET, url, HeaderMap::new(), None)
            .await?;
        let properties = Self::properties(response.headers())?;
        Ok(BlobDownload {
            properties,
            body: http::body_stream(response),
        })
    }

    async fn get_blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties> {
        let url = self.transport.url(ServiceKind::Blob, &[container, blob], &[])?;
        let response = self
            .transport
            .send(Method::HEAD, url, HeaderMap::new(), None)
            .await?;
        Self::properties(response.headers())
    }

    async fn get_blob_metadata(
        &self,
        container: &str,
        blob: &str,
    ) -> Result<HashMap<String, String>> {
        let url = self
            .transport
            .url(ServiceKind::Blob, &[container, blob], &[("comp", "metadata")])?;
        let response = self
            .transport
            .send(Method::HEAD, url, HeaderMap::new(), None)
            .await?;
        Ok(http::metadata(response.headers()))
    }

    async fn copy_blob(
        &self,
        dest_container: &str,
        dest_blob: &str,
        source_container: &str,
        source_blob: &str,
    ) -> Result<()> {
        let url = self
            .transport
            .url(ServiceKind::Blob, &[dest_container, dest_blob], &[])?;
        let source = self
            .transport
            .source_url(ServiceKind::Blob, &[source_container, source_blob])?;
        let mut headers = HeaderMap::new();
        http::insert_header(&mut headers, "x-ms-copy-source", source.as_str())?;

        let response = self.transport.send(Method::PUT, url, headers, None).await?;
        tracing::debug!(
            "Copy {}/{} -> {}/{}: {}",
            source_container,
            source_blob,
            dest_container,
            dest_blob,
            http::header_string(response.headers(), "x-ms-copy-status").unwrap_or_default()
        );
        Ok(())
    }

    async fn delete_blob(&self, container: &str, blob: &str) -> Result<()> {
        let url = self.transport.url(ServiceKind::Blob, &[container, blob], &[])?;
        self.transport
            .send(Method::DELETE, url, HeaderMap::new(), None)
            .await?;
        Ok(())
    }

    async fn list_blobs(&self, container: &str, options: &ListBlobsOptions) -> Result<BlobListing> {
        let mut listing = BlobListing::default();
        let mut marker: Option<String> = None;

        loop {
            let mut query = vec![
                ("restype", "container"),
                ("comp", "list"),
                ("prefix", options.prefix.as_str()),
            ];
            if let Some(delimiter) = &options.delimiter {
                query.push(("delimiter", delimiter.as_str()));
            }
            if let Some(marker) = &marker {
                query.push(("marker", marker.as_str()));
            }

            let url = self.transport.url(ServiceKind::Blob, &[container], &query)?;
            let response = self
                .transport
                .send(Method::GET, url, HeaderMap::new(), None)
                .await?;
            let body = response.text().await?;
            let page: BlobEnumerationResults = xml::from_xml(&body)?;

            for item in page.blobs.items {
                match item {
                    BlobEntry::Blob(blob) => listing.blobs.push(BlobItem {
                        name: blob.name,
                        properties: BlobProperties {
                            last_modified: http::parse_http_date(&blob.properties.last_modified)?,
                            content_length: blob.properties.content_length,
                            content_type: blob.properties.content_type,
                        },
                    }),
                    BlobEntry::BlobPrefix(prefix) => listing.prefixes.push(prefix.name),
                }
            }

            marker = xml::next_marker(page.next_marker);
            if marker.is_none() {
                break;
            }
        }

        Ok(listing)
    }
}
