//! Transcode job wire types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::BlobId;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request to extract the audio track of a stored video.
///
/// Serialized as a flat mapping; the field names are part of the wire
/// contract with other consumers of the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Blob id of the source video. A weak reference: the blob may have
    /// expired by the time the job is processed.
    pub source_blob_id: BlobId,
    /// Opaque requester identifier, passed through for bookkeeping.
    pub requester_id: String,
    /// Opaque requester contact, passed through for completion delivery.
    pub requester_contact: String,
    /// When the job was created
    pub enqueued_at: DateTime<Utc>,
}

impl TranscodeJob {
    /// Create a new transcode job for a stored video.
    pub fn new(
        source_blob_id: BlobId,
        requester_id: impl Into<String>,
        requester_contact: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            source_blob_id,
            requester_id: requester_id.into(),
            requester_contact: requester_contact.into(),
            enqueued_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("transcode:{}", self.source_blob_id)
    }
}
