//! Serde models for the storage services' XML bodies.

use serde::Deserialize;

use crate::utils::error::Result;

/// Parses an XML body, tolerating the UTF-8 BOM the services prepend.
pub fn from_xml<'de, T: Deserialize<'de>>(body: &'de str) -> Result<T> {
    Ok(quick_xml::de::from_str(body.trim_start_matches('\u{feff}'))?)
}

pub fn escape_text(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "Code")]
    pub code: Option<String>,
    #[serde(rename = "Message")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlobEnumerationResults {
    #[serde(rename = "Blobs", default)]
    pub blobs: BlobEntries,
    #[serde(rename = "NextMarker")]
    pub next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlobEntries {
    #[serde(rename = "$value", default)]
    pub items: Vec<BlobEntry>,
}

#[derive(Debug, Deserialize)]
pub enum BlobEntry {
    Blob(BlobXml),
    BlobPrefix(PrefixXml),
}

#[derive(Debug, Deserialize)]
pub struct BlobXml {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Properties")]
    pub properties: BlobPropertiesXml,
}

#[derive(Debug, Deserialize)]
pub struct BlobPropertiesXml {
    #[serde(rename = "Last-Modified")]
    pub last_modified: String,
    #[serde(rename = "Content-Length", default)]
    pub content_length: u64,
    #[serde(rename = "Content-Type")]
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrefixXml {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ShareEnumerationResults {
    #[serde(rename = "Entries", default)]
    pub entries: ShareEntries,
    #[serde(rename = "NextMarker")]
    pub next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShareEntries {
    #[serde(rename = "$value", default)]
    pub items: Vec<ShareEntry>,
}

#[derive(Debug, Deserialize)]
pub enum ShareEntry {
    File(ShareFileXml),
    Directory(PrefixXml),
}

#[derive(Debug, Deserialize)]
pub struct ShareFileXml {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Properties")]
    pub properties: ShareFilePropertiesXml,
}

#[derive(Debug, Deserialize)]
pub struct ShareFilePropertiesXml {
    #[serde(rename = "Content-Length", default)]
    pub content_length: u64,
}

#[derive(Debug, Deserialize)]
pub struct QueueMessagesList {
    #[serde(rename = "QueueMessage", default)]
    pub messages: Vec<QueueMessageXml>,
}

#[derive(Debug, Deserialize)]
pub struct QueueMessageXml {
    #[serde(rename = "MessageId")]
    pub message_id: String,
    #[serde(rename = "InsertionTime")]
    pub insertion_time: Option<String>,
    #[serde(rename = "ExpirationTime")]
    pub expiration_time: Option<String>,
    #[serde(rename = "PopReceipt")]
    pub pop_receipt: String,
    #[serde(rename = "TimeNextVisible")]
    pub time_next_visible: Option<String>,
    #[serde(rename = "DequeueCount", default)]
    pub dequeue_count: u32,
    #[serde(rename = "MessageText", default)]
    pub message_text: String,
}

/// Non-empty marker, if another page follows.
pub fn next_marker(marker: Option<String>) -> Option<String> {
    marker.filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blob_listing_with_prefixes() {
        let body = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\
            <EnumerationResults ServiceEndpoint=\"https://acct.blob.core.windows.net/\" ContainerName=\"c1\">\
              <Prefix>foo/</Prefix><Delimiter>/</Delimiter>\
              <Blobs>\
                <Blob><Name>foo/a.txt</Name><Properties>\
                  <Last-Modified>Wed, 09 Sep 2009 09:20:02 GMT</Last-Modified>\
                  <Content-Length>5</Content-Length>\
                  <Content-Type>text/plain</Content-Type>\
                </Properties></Blob>\
                <BlobPrefix><Name>foo/sub/</Name></BlobPrefix>\
                <Blob><Name>foo/b.bin</Name><Properties>\
                  <Last-Modified>Wed, 09 Sep 2009 09:20:02 GMT</Last-Modified>\
                  <Content-Length>0</Content-Length>\
                </Properties></Blob>\
              </Blobs>\
              <NextMarker />\
            </EnumerationResults>";

        let parsed: BlobEnumerationResults = from_xml(body).unwrap();
        assert_eq!(parsed.blobs.items.len(), 3);
        assert!(matches!(&parsed.blobs.items[1], BlobEntry::BlobPrefix(p) if p.name == "foo/sub/"));
        match &parsed.blobs.items[0] {
            BlobEntry::Blob(blob) => {
                assert_eq!(blob.name, "foo/a.txt");
                assert_eq!(blob.properties.content_length, 5);
                assert_eq!(blob.properties.content_type.as_deref(), Some("text/plain"));
            }
            other => panic!("unexpected entry: {:?}", other),
        }
        assert_eq!(next_marker(parsed.next_marker), None);
    }

    #[test]
    fn test_parse_empty_queue_messages() {
        let parsed: QueueMessagesList =
            from_xml("<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessagesList />").unwrap();
        assert!(parsed.messages.is_empty());
    }

    #[test]
    fn test_parse_error_body() {
        let parsed: ErrorBody = from_xml(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><Error><Code>ContainerNotFound</Code>\
             <Message>The specified container does not exist.</Message></Error>",
        )
        .unwrap();
        assert_eq!(parsed.code.as_deref(), Some("ContainerNotFound"));
    }

    #[test]
    fn test_escape_message_text() {
        assert_eq!(escape_text("<a & b>"), "&lt;a &amp; b&gt;");
    }
}
