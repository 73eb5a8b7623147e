use async_trait::async_trait;
use azure_bridge::client::MemoryQueueService;
use azure_bridge::domain::model::{QueueMessage, QueueMetadata};
use azure_bridge::domain::ports::QueueService;
use azure_bridge::{AzureJob, AzureQueue, BridgeError, Job, Queue, Result};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn queue(service: &MemoryQueueService, auto_base64: bool, auto_create: bool) -> AzureQueue {
    AzureQueue::new(Arc::new(service.clone()), "jobs", None, auto_base64, auto_create)
}

/// Queue service where every queue is missing.
#[derive(Default)]
struct MissingQueueService {
    messages_created: AtomicUsize,
    queues_created: AtomicUsize,
}

fn queue_not_found() -> BridgeError {
    BridgeError::not_found(404, "Not Found", Some("QueueNotFound".to_string()))
}

#[async_trait]
impl QueueService for MissingQueueService {
    async fn create_queue(&self, _queue: &str) -> Result<()> {
        self.queues_created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_message(&self, _: &str, _: &str, _: Option<Duration>) -> Result<()> {
        self.messages_created.fetch_add(1, Ordering::SeqCst);
        Err(queue_not_found())
    }

    async fn list_messages(&self, _: &str, _: u32, _: Duration) -> Result<Vec<QueueMessage>> {
        Err(queue_not_found())
    }

    async fn delete_message(&self, _: &str, _: &str, _: &str) -> Result<()> {
        Err(queue_not_found())
    }

    async fn update_message(&self, _: &str, _: &str, _: &str, _: Duration) -> Result<String> {
        Err(queue_not_found())
    }

    async fn get_queue_metadata(&self, _: &str) -> Result<QueueMetadata> {
        Err(queue_not_found())
    }
}

#[tokio::test]
async fn test_base64_payload_round_trips_through_job() {
    let service = MemoryQueueService::with_queues(&["jobs"]);
    let q = queue(&service, true, false);

    q.push(&json!({"job": "X"}), None).await.unwrap();
    assert_eq!(service.message_texts("jobs").await, vec!["eyJqb2IiOiJYIn0=".to_string()]);

    let job = q.pop(None).await.unwrap().expect("a job");
    assert_eq!(job.raw_body().unwrap(), r#"{"job":"X"}"#);
    assert_eq!(job.attempts(), 1);
    assert_eq!(job.queue(), "jobs");
}

#[tokio::test]
async fn test_push_raw_is_encoded_too() {
    let service = MemoryQueueService::with_queues(&["jobs"]);
    let q = queue(&service, true, false);

    q.push_raw("plain text", None).await.unwrap();
    let job = q.pop(None).await.unwrap().unwrap();
    assert_eq!(job.raw_body().unwrap(), "plain text");
}

#[tokio::test]
async fn test_explicit_queue_name_wins() {
    let service = MemoryQueueService::with_queues(&["jobs", "emails"]);
    let q = queue(&service, false, false);

    q.push(&json!({"to": "a@b.c"}), Some("emails")).await.unwrap();
    assert_eq!(q.size(None).await.unwrap(), 0);
    assert_eq!(q.size(Some("emails")).await.unwrap(), 1);
    assert!(service.message_texts("jobs").await.is_empty());
}

#[tokio::test]
async fn test_push_creates_missing_queue_when_enabled() {
    let service = MemoryQueueService::new();
    queue(&service, false, true)
        .push(&json!({"job": "X"}), None)
        .await
        .unwrap();

    assert!(service.queue_exists("jobs").await);
    assert_eq!(service.message_texts("jobs").await.len(), 1);
}

#[tokio::test]
async fn test_push_to_missing_queue_fails_when_disabled() {
    let service = MemoryQueueService::new();
    let err = queue(&service, false, false)
        .push(&json!({"job": "X"}), None)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(!service.queue_exists("jobs").await);
}

#[tokio::test]
async fn test_second_push_failure_propagates() {
    let service = Arc::new(MissingQueueService::default());
    let q = AzureQueue::new(service.clone(), "jobs", None, false, true);

    let err = q.push_raw("x", None).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(service.messages_created.load(Ordering::SeqCst), 2);
    assert_eq!(service.queues_created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delayed_message_is_invisible() {
    let service = MemoryQueueService::with_queues(&["jobs"]);
    let q = queue(&service, false, false);

    q.later(Duration::from_secs(60), &json!({"job": "later"}), None)
        .await
        .unwrap();

    assert!(q.pop(None).await.unwrap().is_none());
    assert_eq!(q.size(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_deleted_job_leaves_queue() {
    let service = MemoryQueueService::with_queues(&["jobs"]);
    let q = queue(&service, false, false);
    q.push_raw("x", None).await.unwrap();

    let mut job = q.pop(None).await.unwrap().unwrap();
    job.delete().await.unwrap();

    assert!(job.is_deleted());
    assert!(job.is_deleted_or_released());
    assert_eq!(q.size(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_released_job_comes_back_with_same_id() {
    let service = MemoryQueueService::with_queues(&["jobs"]);
    let q = queue(&service, false, false);
    q.push_raw("x", None).await.unwrap();

    let mut first = q.pop(None).await.unwrap().unwrap();
    first.release(Duration::from_secs(0)).await.unwrap();
    assert!(first.is_released());
    assert_eq!(service.message_texts("jobs").await.len(), 1);

    let second = q.pop(None).await.unwrap().unwrap();
    assert_eq!(second.job_id(), first.job_id());
    assert_eq!(second.attempts(), 2);
}

#[tokio::test]
async fn test_delete_with_stale_receipt_fails() {
    let service = MemoryQueueService::with_queues(&["jobs"]);
    let q = queue(&service, false, false);
    q.push_raw("x", None).await.unwrap();

    // Lease with no visibility window so the next pop receives it again.
    let leased = service
        .list_messages("jobs", 1, Duration::from_secs(0))
        .await
        .unwrap()
        .remove(0);
    let mut stale = AzureJob::new(Arc::new(service.clone()), leased, "jobs", false);

    let mut current = q.pop(None).await.unwrap().unwrap();
    assert_eq!(current.job_id(), stale.job_id());

    let err = stale.delete().await.unwrap_err();
    assert!(matches!(err, BridgeError::StaleLease { .. }));

    current.delete().await.unwrap();
    assert_eq!(q.size(None).await.unwrap(), 0);
}
