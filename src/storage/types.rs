//! Storage types

use serde::Serialize;

/// A published storage object
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    /// Object key within the bucket
    pub key: String,
    /// Publicly reachable URL
    pub url: String,
    /// Size in bytes
    pub size: usize,
}

/// Storage-specific errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 connection failed: {0}")]
    ConnectionFailed(String),

    #[error("S3 SDK error: {0}")]
    SdkError(String),
}
