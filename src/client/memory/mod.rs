//! In-process stand-ins for the storage services.
//!
//! They reproduce what the adapters can observe from the real services:
//! 404s for missing containers, shares, queues and items, 409 conflicts on
//! re-creation, pop receipts and visibility windows.

mod blob;
mod file;
mod queue;

pub use blob::MemoryBlobService;
pub use file::MemoryFileService;
pub use queue::MemoryQueueService;

use crate::utils::error::BridgeError;

fn not_found(code: &str) -> BridgeError {
    BridgeError::not_found(404, "Not Found", Some(code.to_string()))
}

fn conflict(code: &str) -> BridgeError {
    BridgeError::ServiceFailure {
        status: 409,
        reason: "Conflict".to_string(),
        code: Some(code.to_string()),
        message: String::new(),
    }
}

fn invalid_uri() -> BridgeError {
    BridgeError::ServiceFailure {
        status: 400,
        reason: "Bad Request".to_string(),
        code: Some("InvalidUri".to_string()),
        message: String::new(),
    }
}

fn single_chunk(content: bytes::Bytes) -> crate::domain::model::ByteStream {
    Box::pin(futures::stream::once(async move { Ok(content) }))
}
