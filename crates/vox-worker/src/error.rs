//! Worker error types.
//!
//! A `WorkerError` out of [`Processor::process`](crate::Processor::process)
//! means the failure is transient: the job stays unacked and the broker
//! redelivers it. Terminal failures are not errors here; they come back as
//! [`JobOutcome::Failed`](crate::JobOutcome::Failed) and get acked.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Storage error: {0}")]
    Storage(#[from] vox_store::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] vox_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
