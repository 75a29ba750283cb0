//! Blob identifiers, object classes and metadata keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace under which derived-audio ids are computed from their source id.
const DERIVED_AUDIO_NAMESPACE: Uuid = Uuid::from_u128(0x8f1d_4c2a_9b3e_4a77_b1c5_6d0e_2f48_a913);

/// Unique identifier for a blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(pub String);

impl BlobId {
    /// Generate a fresh random blob ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The canonical id of the audio blob derived from `source`.
    ///
    /// Deterministic, so a redelivered job writes the same object instead of
    /// minting a duplicate.
    pub fn derived_audio(source: &BlobId) -> Self {
        Self(Uuid::new_v5(&DERIVED_AUDIO_NAMESPACE, source.0.as_bytes()).to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BlobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object class of a blob, selecting its expiry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobClass {
    /// Uploaded source video; expires after the configured video TTL.
    Video,
    /// Derived audio track; kept unless an audio TTL is configured.
    Audio,
}

impl BlobClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobClass::Video => "video",
            BlobClass::Audio => "audio",
        }
    }
}

impl fmt::Display for BlobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known blob metadata keys.
pub mod meta {
    /// Requester that uploaded the source object.
    pub const UPLOADED_BY: &str = "uploaded_by";
    /// RFC 3339 timestamp of the original upload.
    pub const UPLOAD_TIME: &str = "upload_time";
    /// Source video id recorded on derived audio objects.
    pub const ORIGINAL_VIDEO_ID: &str = "original_video_id";
}
