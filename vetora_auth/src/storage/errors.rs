use thiserror::Error;

/// Errors raised by the generic cache and data stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
