use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::job::AzureJob;
use crate::domain::ports::{Job, Queue, QueueService};
use crate::utils::error::Result;

pub const DEFAULT_VISIBILITY_TIMEOUT: u64 = 5;

/// Queue contract over one storage account's queue service.
#[derive(Clone)]
pub struct AzureQueue {
    client: Arc<dyn QueueService>,
    default_queue: String,
    visibility_timeout: u64,
    auto_base64: bool,
    auto_create_queue: bool,
}

impl AzureQueue {
    /// A missing or zero `visibility_timeout` falls back to 5 seconds.
    pub fn new(
        client: Arc<dyn QueueService>,
        default_queue: impl Into<String>,
        visibility_timeout: Option<u64>,
        auto_base64: bool,
        auto_create_queue: bool,
    ) -> Self {
        Self {
            client,
            default_queue: default_queue.into(),
            visibility_timeout: visibility_timeout
                .filter(|t| *t > 0)
                .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT),
            auto_base64,
            auto_create_queue,
        }
    }

    pub fn client(&self) -> &Arc<dyn QueueService> {
        &self.client
    }

    /// Explicit non-empty name wins over the default queue.
    pub fn get_queue<'a>(&'a self, queue: Option<&'a str>) -> &'a str {
        match queue {
            Some(name) if !name.is_empty() => name,
            _ => &self.default_queue,
        }
    }

    pub fn visibility_timeout(&self) -> u64 {
        self.visibility_timeout
    }

    fn encode_payload(&self, payload: &str) -> String {
        if self.auto_base64 {
            STANDARD.encode(payload)
        } else {
            payload.to_string()
        }
    }
}

#[async_trait]
impl Queue for AzureQueue {
    async fn size(&self, queue: Option<&str>) -> Result<u64> {
        let queue = self.get_queue(queue);
        let metadata = self.client.get_queue_metadata(queue).await?;
        Ok(metadata.approximate_message_count)
    }

    async fn push(&self, job: &serde_json::Value, queue: Option<&str>) -> Result<()> {
        let payload = serde_json::to_string(job)?;
        self.push_raw(&payload, queue).await
    }

    async fn push_raw(&self, payload: &str, queue: Option<&str>) -> Result<()> {
        let queue = self.get_queue(queue);
        let text = self.encode_payload(payload);

        match self.client.create_message(queue, &text, None).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() && self.auto_create_queue => {
                tracing::info!("Queue {} not found, creating it", queue);
                self.client.create_queue(queue).await?;
                self.client.create_message(queue, &text, None).await?;
            }
            Err(err) => return Err(err),
        }

        tracing::debug!("Pushed message to {}", queue);
        Ok(())
    }

    async fn later(
        &self,
        delay: Duration,
        job: &serde_json::Value,
        queue: Option<&str>,
    ) -> Result<()> {
        let queue = self.get_queue(queue);
        let text = self.encode_payload(&serde_json::to_string(job)?);
        self.client.create_message(queue, &text, Some(delay)).await?;
        tracing::debug!("Scheduled message on {} in {}s", queue, delay.as_secs());
        Ok(())
    }

    async fn pop(&self, queue: Option<&str>) -> Result<Option<Box<dyn Job>>> {
        let queue = self.get_queue(queue);
        let mut messages = self
            .client
            .list_messages(queue, 1, Duration::from_secs(self.visibility_timeout))
            .await?;

        if messages.is_empty() {
            return Ok(None);
        }

        let message = messages.swap_remove(0);
        tracing::debug!("Popped message {} from {}", message.message_id, queue);
        let job = AzureJob::new(self.client.clone(), message, queue, self.auto_base64)
            .with_visibility_timeout(Duration::from_secs(self.visibility_timeout));
        Ok(Some(Box::new(job)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryQueueService;

    fn queue(service: &MemoryQueueService, timeout: Option<u64>) -> AzureQueue {
        AzureQueue::new(Arc::new(service.clone()), "default", timeout, false, false)
    }

    #[test]
    fn test_queue_resolution_prefers_explicit_name() {
        let q = queue(&MemoryQueueService::new(), None);
        assert_eq!(q.get_queue(Some("emails")), "emails");
        assert_eq!(q.get_queue(Some("")), "default");
        assert_eq!(q.get_queue(None), "default");
    }

    #[test]
    fn test_visibility_timeout_defaults_to_five() {
        let service = MemoryQueueService::new();
        assert_eq!(queue(&service, None).visibility_timeout(), 5);
        assert_eq!(queue(&service, Some(0)).visibility_timeout(), 5);
        assert_eq!(queue(&service, Some(30)).visibility_timeout(), 30);
    }

    #[tokio::test]
    async fn test_pop_on_empty_queue_returns_none() {
        let service = MemoryQueueService::with_queues(&["default"]);
        assert!(queue(&service, None).pop(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_popped_job_carries_visibility_timeout() {
        let service = MemoryQueueService::with_queues(&["default"]);
        let q = queue(&service, Some(30));
        q.push_raw("x", None).await.unwrap();

        let job = q.pop(None).await.unwrap().unwrap();
        assert_eq!(job.visibility_timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_later_does_not_create_missing_queue() {
        let service = MemoryQueueService::new();
        let q = AzureQueue::new(Arc::new(service.clone()), "default", None, false, true);

        let err = q
            .later(Duration::from_secs(10), &serde_json::json!({"job": "X"}), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!service.queue_exists("default").await);
    }
}
