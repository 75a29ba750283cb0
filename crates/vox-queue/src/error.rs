//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The broker cannot accept or serve requests right now. The caller
    /// must retry or surface the failure; a job is never silently dropped.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    #[error("Queue closed")]
    Closed,

    #[error("Unknown delivery tag: {0}")]
    UnknownDelivery(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
