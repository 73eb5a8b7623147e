use crate::utils::error::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
}

/// Host-facing description of a file or directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dirname: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Serialized only when the bytes are UTF-8 text.
    #[serde(
        default,
        skip_serializing_if = "not_text",
        serialize_with = "contents_text::serialize",
        deserialize_with = "contents_text::deserialize"
    )]
    pub contents: Option<Bytes>,
}

fn not_text(contents: &Option<Bytes>) -> bool {
    contents
        .as_ref()
        .map_or(true, |bytes| std::str::from_utf8(bytes).is_err())
}

mod contents_text {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        contents: &Option<Bytes>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match contents.as_deref().map(std::str::from_utf8) {
            Some(Ok(text)) => serializer.serialize_str(text),
            _ => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Bytes>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.map(Bytes::from))
    }
}

impl FileEntry {
    pub fn file(path: impl Into<String>, dirname: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            dirname: Some(dirname.into()),
            entry_type: EntryType::File,
            size: None,
            mimetype: None,
            timestamp: None,
            contents: None,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            dirname: None,
            entry_type: EntryType::Dir,
            size: None,
            mimetype: None,
            timestamp: None,
            contents: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Dir
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }
}

/// Result of `read_stream`: metadata plus the unread body.
pub struct StreamedFile {
    pub entry: FileEntry,
    pub stream: ByteStream,
}

impl std::fmt::Debug for StreamedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamedFile")
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

/// Per-write options forwarded to the vendor as content headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteOptions {
    pub content_type: Option<String>,
    /// Takes precedence over `content_type` when both are set.
    pub mimetype: Option<String>,
    pub cache_control: Option<String>,
    pub content_language: Option<String>,
    pub content_encoding: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl WriteOptions {
    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    pub fn with_cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Content headers as sent to the storage service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOptions {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_language: Option<String>,
    pub content_encoding: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlobProperties {
    pub last_modified: DateTime<Utc>,
    pub content_length: u64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlobItem {
    pub name: String,
    pub properties: BlobProperties,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListBlobsOptions {
    pub prefix: String,
    pub delimiter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlobListing {
    pub blobs: Vec<BlobItem>,
    /// Names of the grouped prefixes, trailing delimiter included.
    pub prefixes: Vec<String>,
}

pub struct BlobDownload {
    pub properties: BlobProperties,
    pub body: ByteStream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileProperties {
    pub last_modified: DateTime<Utc>,
    pub content_length: u64,
    pub content_type: Option<String>,
}

pub struct FileDownload {
    pub properties: FileProperties,
    pub body: ByteStream,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShareItem {
    Directory { name: String },
    File { name: String, content_length: u64 },
}

impl ShareItem {
    pub fn name(&self) -> &str {
        match self {
            ShareItem::Directory { name } | ShareItem::File { name, .. } => name,
        }
    }
}

/// Snapshot of a dequeued message.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    pub message_id: String,
    pub pop_receipt: String,
    pub message_text: String,
    pub dequeue_count: u32,
    pub insertion_time: Option<DateTime<Utc>>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub time_next_visible: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueMetadata {
    /// Eventually consistent; treat as an estimate.
    pub approximate_message_count: u64,
    pub metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serializes_text_contents() {
        let mut entry = FileEntry::file("docs/a.txt", "docs");
        entry.contents = Some(Bytes::from_static(b"hello"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["contents"], "hello");
        assert_eq!(json["type"], "file");

        let back: FileEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.contents, Some(Bytes::from_static(b"hello")));

        entry.contents = Some(Bytes::from_static(&[0xff, 0xfe]));
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("contents").is_none());
    }
}
