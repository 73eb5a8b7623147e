use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::time::Duration;

use crate::client::connection::{ServiceKind, StorageAccount};
use crate::client::http::{self, RestTransport};
use crate::client::xml::{self, QueueMessagesList};
use crate::domain::model::{QueueMessage, QueueMetadata};
use crate::domain::ports::QueueService;
use crate::utils::error::{BridgeError, Result};

/// Queue service over the REST API.
#[derive(Debug, Clone)]
pub struct QueueRestClient {
    transport: RestTransport,
}

impl QueueRestClient {
    pub fn new(account: StorageAccount, timeout: Duration) -> Result<Self> {
        Ok(Self {
            transport: RestTransport::new(account, timeout)?,
        })
    }

    pub fn from_connection_string(connection_string: &str, timeout: Duration) -> Result<Self> {
        Self::new(StorageAccount::from_connection_string(connection_string)?, timeout)
    }
}

/// Maps a rejected pop receipt to `StaleLease`.
fn lease_error(err: BridgeError, message_id: &str) -> BridgeError {
    let stale = matches!(err.error_code(), Some("MessageNotFound") | Some("PopReceiptMismatch"));
    if stale {
        tracing::warn!("Pop receipt for message {} is no longer valid", message_id);
        BridgeError::StaleLease {
            message_id: message_id.to_string(),
            reason: err.to_string(),
        }
    } else {
        err
    }
}

fn parse_optional_date(value: Option<String>) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| http::parse_http_date(&v))
        .transpose()
}

#[async_trait]
impl QueueService for QueueRestClient {
    async fn create_queue(&self, queue: &str) -> Result<()> {
        let url = self.transport.url(ServiceKind::Queue, &[queue], &[])?;
        self.transport
            .send(Method::PUT, url, HeaderMap::new(), None)
            .await?;
        tracing::debug!("Created queue {}", queue);
        Ok(())
    }

    async fn create_message(
        &self,
        queue: &str,
        text: &str,
        visibility_delay: Option<Duration>,
    ) -> Result<()> {
        let delay = visibility_delay.map(|d| d.as_secs().to_string());
        let mut query = Vec::new();
        if let Some(delay) = &delay {
            query.push(("visibilitytimeout", delay.as_str()));
        }
        let url = self
            .transport
            .url(ServiceKind::Queue, &[queue, "messages"], &query)?;

        let body = format!(
            "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            xml::escape_text(text)
        );
        let mut headers = HeaderMap::new();
        http::insert_header(&mut headers, "content-type", "application/xml")?;
        self.transport
            .send(Method::POST, url, headers, Some(Bytes::from(body)))
            .await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        queue: &str,
        number_of_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>> {
        let count = number_of_messages.to_string();
        let timeout = visibility_timeout.as_secs().to_string();
        let url = self.transport.url(
            ServiceKind::Queue,
            &[queue, "messages"],
            &[("numofmessages", count.as_str()), ("visibilitytimeout", timeout.as_str())],
        )?;
        let response = self
            .transport
            .send(Method::GET, url, HeaderMap::new(), None)
            .await?;
        let body = response.text().await?;
        let list: QueueMessagesList = xml::from_xml(&body)?;

        list.messages
            .into_iter()
            .map(|m| {
                Ok(QueueMessage {
                    message_id: m.message_id,
                    pop_receipt: m.pop_receipt,
                    message_text: m.message_text,
                    dequeue_count: m.dequeue_count,
                    insertion_time: parse_optional_date(m.insertion_time)?,
                    expiration_time: parse_optional_date(m.expiration_time)?,
                    time_next_visible: parse_optional_date(m.time_next_visible)?,
                })
            })
            .collect()
    }

    async fn delete_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> Result<()> {
        let url = self.transport.url(
            ServiceKind::Queue,
            &[queue, "messages", message_id],
            &[("popreceipt", pop_receipt)],
        )?;
        self.transport
            .send(Method::DELETE, url, HeaderMap::new(), None)
            .await
            .map_err(|e| lease_error(e, message_id))?;
        Ok(())
    }

    async fn update_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
        visibility_timeout: Duration,
    ) -> Result<String> {
        let timeout = visibility_timeout.as_secs().to_string();
        let url = self.transport.url(
            ServiceKind::Queue,
            &[queue, "messages", message_id],
            &[("popreceipt", pop_receipt), ("visibilitytimeout", timeout.as_str())],
        )?;
        let response = self
            .transport
            .send(Method::PUT, url, HeaderMap::new(), None)
            .await
            .map_err(|e| lease_error(e, message_id))?;
        Ok(http::header_string(response.headers(), "x-ms-popreceipt").unwrap_or_default())
    }

    async fn get_queue_metadata(&self, queue: &str) -> Result<QueueMetadata> {
        let url = self
            .transport
            .url(ServiceKind::Queue, &[queue], &[("comp", "metadata")])?;
        let response = self
            .transport
            .send(Method::HEAD, url, HeaderMap::new(), None)
            .await?;
        Ok(QueueMetadata {
            approximate_message_count: http::header_u64(
                response.headers(),
                "x-ms-approximate-messages-count",
            )?,
            metadata: http::metadata(response.headers()),
        })
    }
}
