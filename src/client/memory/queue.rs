use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{conflict, not_found};
use crate::domain::model::{QueueMessage, QueueMetadata};
use crate::domain::ports::QueueService;
use crate::utils::error::{BridgeError, Result};

/// Messages expire after seven days, as with the service default.
const MESSAGE_TTL_SECONDS: i64 = 7 * 24 * 3600;

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    pop_receipt: String,
    text: String,
    dequeue_count: u32,
    inserted: DateTime<Utc>,
    visible_at: DateTime<Utc>,
}

impl StoredMessage {
    fn snapshot(&self) -> QueueMessage {
        QueueMessage {
            message_id: self.id.clone(),
            pop_receipt: self.pop_receipt.clone(),
            message_text: self.text.clone(),
            dequeue_count: self.dequeue_count,
            insertion_time: Some(self.inserted),
            expiration_time: Some(self.inserted + chrono::Duration::seconds(MESSAGE_TTL_SECONDS)),
            time_next_visible: Some(self.visible_at),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryQueueService {
    queues: Arc<Mutex<HashMap<String, Vec<StoredMessage>>>>,
    sequence: Arc<AtomicU64>,
}

fn after(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

impl MemoryQueueService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queues(names: &[&str]) -> Self {
        let queues = names
            .iter()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        Self {
            queues: Arc::new(Mutex::new(queues)),
            sequence: Arc::default(),
        }
    }

    pub async fn queue_exists(&self, queue: &str) -> bool {
        self.queues.lock().await.contains_key(queue)
    }

    /// Stored message bodies, visible or not, in insertion order.
    pub async fn message_texts(&self, queue: &str) -> Vec<String> {
        self.queues
            .lock()
            .await
            .get(queue)
            .map(|messages| messages.iter().map(|m| m.text.clone()).collect())
            .unwrap_or_default()
    }

    fn next_id(&self, kind: &str) -> String {
        format!("{}-{}", kind, self.sequence.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn leased<'a>(
        messages: &'a mut [StoredMessage],
        message_id: &str,
        pop_receipt: &str,
    ) -> Result<&'a mut StoredMessage> {
        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| BridgeError::StaleLease {
                message_id: message_id.to_string(),
                reason: "message not found".to_string(),
            })?;
        if message.pop_receipt != pop_receipt {
            return Err(BridgeError::StaleLease {
                message_id: message_id.to_string(),
                reason: "pop receipt mismatch".to_string(),
            });
        }
        Ok(message)
    }
}

#[async_trait]
impl QueueService for MemoryQueueService {
    async fn create_queue(&self, queue: &str) -> Result<()> {
        let mut queues = self.queues.lock().await;
        if queues.contains_key(queue) {
            return Err(conflict("QueueAlreadyExists"));
        }
        queues.insert(queue.to_string(), Vec::new());
        Ok(())
    }

    async fn create_message(
        &self,
        queue: &str,
        text: &str,
        visibility_delay: Option<Duration>,
    ) -> Result<()> {
        let id = self.next_id("msg");
        let pop_receipt = self.next_id("receipt");
        let mut queues = self.queues.lock().await;
        let messages = queues
            .get_mut(queue)
            .ok_or_else(|| not_found("QueueNotFound"))?;

        let now = Utc::now();
        messages.push(StoredMessage {
            id,
            pop_receipt,
            text: text.to_string(),
            dequeue_count: 0,
            inserted: now,
            visible_at: after(now, visibility_delay.unwrap_or_default()),
        });
        Ok(())
    }

    async fn list_messages(
        &self,
        queue: &str,
        number_of_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>> {
        let mut queues = self.queues.lock().await;
        let messages = queues
            .get_mut(queue)
            .ok_or_else(|| not_found("QueueNotFound"))?;

        let now = Utc::now();
        let mut popped = Vec::new();
        for message in messages.iter_mut() {
            if popped.len() as u32 >= number_of_messages {
                break;
            }
            if message.visible_at > now {
                continue;
            }
            message.dequeue_count += 1;
            message.pop_receipt = self.next_id("receipt");
            message.visible_at = after(now, visibility_timeout);
            popped.push(message.snapshot());
        }
        Ok(popped)
    }

    async fn delete_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> Result<()> {
        let mut queues = self.queues.lock().await;
        let messages = queues
            .get_mut(queue)
            .ok_or_else(|| not_found("QueueNotFound"))?;
        Self::leased(messages, message_id, pop_receipt)?;
        messages.retain(|m| m.id != message_id);
        Ok(())
    }

    async fn update_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
        visibility_timeout: Duration,
    ) -> Result<String> {
        let new_receipt = self.next_id("receipt");
        let mut queues = self.queues.lock().await;
        let messages = queues
            .get_mut(queue)
            .ok_or_else(|| not_found("QueueNotFound"))?;
        let message = Self::leased(messages, message_id, pop_receipt)?;
        message.pop_receipt = new_receipt.clone();
        message.visible_at = after(Utc::now(), visibility_timeout);
        Ok(new_receipt)
    }

    async fn get_queue_metadata(&self, queue: &str) -> Result<QueueMetadata> {
        let queues = self.queues.lock().await;
        let messages = queues.get(queue).ok_or_else(|| not_found("QueueNotFound"))?;
        Ok(QueueMetadata {
            approximate_message_count: messages.len() as u64,
            metadata: HashMap::new(),
        })
    }
}
