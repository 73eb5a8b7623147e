use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::queue::DEFAULT_VISIBILITY_TIMEOUT;
use crate::domain::model::QueueMessage;
use crate::domain::ports::{Job, QueueService};
use crate::utils::error::{BridgeError, Result};

/// A message leased from a queue by `pop`.
pub struct AzureJob {
    client: Arc<dyn QueueService>,
    message: QueueMessage,
    queue: String,
    auto_base64: bool,
    visibility_timeout: Duration,
    deleted: bool,
    released: bool,
}

impl AzureJob {
    pub fn new(
        client: Arc<dyn QueueService>,
        message: QueueMessage,
        queue: impl Into<String>,
        auto_base64: bool,
    ) -> Self {
        Self {
            client,
            message,
            queue: queue.into(),
            auto_base64,
            visibility_timeout: Duration::from_secs(DEFAULT_VISIBILITY_TIMEOUT),
            deleted: false,
            released: false,
        }
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// The message as it was received, with the latest pop receipt.
    pub fn message(&self) -> &QueueMessage {
        &self.message
    }

    fn warn_if_stale(&self, err: BridgeError) -> BridgeError {
        if let BridgeError::StaleLease { reason, .. } = &err {
            tracing::warn!(
                "Lease on message {} in {} is gone: {}",
                self.message.message_id,
                self.queue,
                reason
            );
        }
        err
    }
}

impl std::fmt::Debug for AzureJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureJob")
            .field("message", &self.message)
            .field("queue", &self.queue)
            .field("visibility_timeout", &self.visibility_timeout)
            .field("deleted", &self.deleted)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Job for AzureJob {
    fn job_id(&self) -> &str {
        &self.message.message_id
    }

    fn raw_body(&self) -> Result<String> {
        if !self.auto_base64 {
            return Ok(self.message.message_text.clone());
        }
        let decoded = STANDARD.decode(self.message.message_text.trim())?;
        Ok(String::from_utf8(decoded)?)
    }

    fn attempts(&self) -> u32 {
        self.message.dequeue_count
    }

    fn queue(&self) -> &str {
        &self.queue
    }

    fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    async fn delete(&mut self) -> Result<()> {
        self.deleted = true;
        self.client
            .delete_message(
                &self.queue,
                &self.message.message_id,
                &self.message.pop_receipt,
            )
            .await
            .map_err(|err| self.warn_if_stale(err))?;
        tracing::debug!("Deleted message {} from {}", self.message.message_id, self.queue);
        Ok(())
    }

    async fn release(&mut self, delay: Duration) -> Result<()> {
        self.released = true;
        let receipt = self
            .client
            .update_message(
                &self.queue,
                &self.message.message_id,
                &self.message.pop_receipt,
                delay,
            )
            .await
            .map_err(|err| self.warn_if_stale(err))?;
        self.message.pop_receipt = receipt;
        tracing::debug!(
            "Released message {} in {} for {}s",
            self.message.message_id,
            self.queue,
            delay.as_secs()
        );
        Ok(())
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn is_released(&self) -> bool {
        self.released
    }
}
