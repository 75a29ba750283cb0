//! The job queue contract.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use vox_models::TranscodeJob;

use crate::error::QueueResult;

/// Broker-assigned identifier for one delivery of a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryTag(pub String);

impl DeliveryTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job handed to a consumer, together with its ack handle.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub job: TranscodeJob,
}

/// Persistent, at-least-once FIFO channel of transcode jobs.
///
/// A delivered, unacknowledged job is leased to exactly one consumer at a
/// time; if the lease lapses (worker crash or disconnect) the job is
/// redelivered. FIFO ordering is best effort only; nothing may depend on
/// strict ordering across producers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Durably enqueue a job. Returns only once the broker has accepted
    /// the write; fails with `Unavailable` otherwise.
    async fn enqueue(&self, job: &TranscodeJob) -> QueueResult<DeliveryTag>;

    /// Receive the next job for `consumer`, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` when nothing became available in time, so
    /// callers can interleave shutdown checks.
    async fn receive(&self, consumer: &str, timeout: Duration) -> QueueResult<Option<Delivery>>;

    /// Mark a delivered job complete. Called only after the job's side
    /// effects are durably committed; acking earlier risks silent loss on
    /// a crash between ack and commit.
    async fn ack(&self, tag: &DeliveryTag) -> QueueResult<()>;
}
