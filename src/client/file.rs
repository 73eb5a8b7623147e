use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::collections::HashMap;
use std::time::Duration;

use crate::client::connection::{ServiceKind, StorageAccount};
use crate::client::http::{self, RestTransport};
use crate::client::xml::{self, ShareEntry, ShareEnumerationResults};
use crate::domain::model::{FileDownload, FileProperties, ShareItem, UploadOptions};
use crate::domain::ports::FileService;
use crate::utils::error::Result;

/// Largest range a single Put Range call accepts.
const MAX_RANGE_BYTES: usize = 4 * 1024 * 1024;

/// File (share) service over the REST API.
#[derive(Debug, Clone)]
pub struct FileRestClient {
    transport: RestTransport,
}

impl FileRestClient {
    pub fn new(account: StorageAccount, timeout: Duration) -> Result<Self> {
        Ok(Self {
            transport: RestTransport::new(account, timeout)?,
        })
    }

    pub fn from_connection_string(connection_string: &str, timeout: Duration) -> Result<Self> {
        Self::new(StorageAccount::from_connection_string(connection_string)?, timeout)
    }

    fn properties(headers: &HeaderMap) -> Result<FileProperties> {
        Ok(FileProperties {
            last_modified: http::last_modified(headers)?,
            content_length: http::header_u64(headers, "content-length")?,
            content_type: http::header_string(headers, "content-type"),
        })
    }

    async fn put_range(&self, share: &str, path: &str, start: usize, chunk: Bytes) -> Result<()> {
        let url = self
            .transport
            .url(ServiceKind::File, &[share, path], &[("comp", "range")])?;
        let mut headers = HeaderMap::new();
        let end = start + chunk.len() - 1;
        http::insert_header(&mut headers, "x-ms-range", &format!("bytes={}-{}", start, end))?;
        http::insert_header(&mut headers, "x-ms-write", "update")?;
        self.transport
            .send(Method::PUT, url, headers, Some(chunk))
            .await?;
        Ok(())
    }
}

fn trim_dir(path: &str) -> &str {
    path.trim_end_matches('/')
}

#[async_trait]
impl FileService for FileRestClient {
    async fn create_share(&self, share: &str) -> Result<()> {
        let url = self
            .transport
            .url(ServiceKind::File, &[share], &[("restype", "share")])?;
        self.transport
            .send(Method::PUT, url, HeaderMap::new(), None)
            .await?;
        tracing::debug!("Created share {}", share);
        Ok(())
    }

    async fn create_directory(&self, share: &str, path: &str) -> Result<()> {
        let url = self.transport.url(
            ServiceKind::File,
            &[share, trim_dir(path)],
            &[("restype", "directory")],
        )?;
        self.transport
            .send(Method::PUT, url, HeaderMap::new(), None)
            .await?;
        Ok(())
    }

    async fn delete_directory(&self, share: &str, path: &str) -> Result<()> {
        let url = self.transport.url(
            ServiceKind::File,
            &[share, trim_dir(path)],
            &[("restype", "directory")],
        )?;
        self.transport
            .send(Method::DELETE, url, HeaderMap::new(), None)
            .await?;
        Ok(())
    }

    async fn create_file_from_content(
        &self,
        share: &str,
        path: &str,
        content: Bytes,
        options: &UploadOptions,
    ) -> Result<()> {
        let url = self.transport.url(ServiceKind::File, &[share, path], &[])?;
        let mut headers = http::upload_headers(options, "x-ms-")?;
        http::insert_header(&mut headers, "x-ms-type", "file")?;
        http::insert_header(&mut headers, "x-ms-content-length", &content.len().to_string())?;
        self.transport.send(Method::PUT, url, headers, None).await?;

        let mut start = 0;
        while start < content.len() {
            let end = (start + MAX_RANGE_BYTES).min(content.len());
            self.put_range(share, path, start, content.slice(start..end))
                .await?;
            start = end;
        }
        Ok(())
    }

    async fn get_file(&self, share: &str, path: &str) -> Result<FileDownload> {
        let url = self.transport.url(ServiceKind::File, &[share, path], &[])?;
        let response = self
            .transport
            .send(Method::GET, url, HeaderMap::new(), None)
            .await?;
        let properties = Self::properties(response.headers())?;
        Ok(FileDownload {
            properties,
            body: http::body_stream(response),
        })
    }

    async fn get_file_properties(&self, share: &str, path: &str) -> Result<FileProperties> {
        let url = self.transport.url(ServiceKind::File, &[share, path], &[])?;
        let response = self
            .transport
            .send(Method::HEAD, url, HeaderMap::new(), None)
            .await?;
        Self::properties(response.headers())
    }

    async fn get_file_metadata(&self, share: &str, path: &str) -> Result<HashMap<String, String>> {
        let url = self
            .transport
            .url(ServiceKind::File, &[share, path], &[("comp", "metadata")])?;
        let response = self
            .transport
            .send(Method::HEAD, url, HeaderMap::new(), None)
            .await?;
        Ok(http::metadata(response.headers()))
    }

    async fn copy_file(&self, share: &str, dest_path: &str, source_path: &str) -> Result<()> {
        let url = self.transport.url(ServiceKind::File, &[share, dest_path], &[])?;
        let source = self
            .transport
            .source_url(ServiceKind::File, &[share, source_path])?;
        let mut headers = HeaderMap::new();
        http::insert_header(&mut headers, "x-ms-copy-source", source.as_str())?;
        self.transport.send(Method::PUT, url, headers, None).await?;
        Ok(())
    }

    async fn delete_file(&self, share: &str, path: &str) -> Result<()> {
        let url = self.transport.url(ServiceKind::File, &[share, path], &[])?;
        self.transport
            .send(Method::DELETE, url, HeaderMap::new(), None)
            .await?;
        Ok(())
    }

    async fn list_directories_and_files(
        &self,
        share: &str,
        directory: &str,
    ) -> Result<Vec<ShareItem>> {
        let directory = trim_dir(directory);
        let segments: Vec<&str> = if directory.is_empty() {
            vec![share]
        } else {
            vec![share, directory]
        };

        let mut items = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut query = vec![("restype", "directory"), ("comp", "list")];
            if let Some(marker) = &marker {
                query.push(("marker", marker.as_str()));
            }

            let url = self.transport.url(ServiceKind::File, &segments, &query)?;
            let response = self
                .transport
                .send(Method::GET, url, HeaderMap::new(), None)
                .await?;
            let body = response.text().await?;
            let page: ShareEnumerationResults = xml::from_xml(&body)?;

            items.extend(page.entries.items.into_iter().map(|entry| match entry {
                ShareEntry::Directory(dir) => ShareItem::Directory { name: dir.name },
                ShareEntry::File(file) => ShareItem::File {
                    name: file.name,
                    content_length: file.properties.content_length,
                },
            }));

            marker = xml::next_marker(page.next_marker);
            if marker.is_none() {
                break;
            }
        }

        Ok(items)
    }
}
