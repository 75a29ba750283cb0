//! Per-class expiry policy.

use std::time::Duration;

use chrono::{DateTime, Utc};

use vox_models::BlobClass;

/// Time-to-live per object class.
///
/// `None` means objects of that class never expire. The defaults mirror the
/// production setup: uploaded videos live one hour, derived audio is kept.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    pub video: Option<Duration>,
    pub audio: Option<Duration>,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            video: Some(Duration::from_secs(3600)),
            audio: None,
        }
    }
}

impl TtlPolicy {
    /// Policy under which nothing ever expires.
    pub fn keep_forever() -> Self {
        Self {
            video: None,
            audio: None,
        }
    }

    /// Create policy from environment variables.
    ///
    /// `VOX_VIDEO_TTL_SECS` and `VOX_AUDIO_TTL_SECS`; `0` disables expiry
    /// for that class.
    pub fn from_env() -> Self {
        Self {
            video: ttl_from_env("VOX_VIDEO_TTL_SECS").unwrap_or(Some(Duration::from_secs(3600))),
            audio: ttl_from_env("VOX_AUDIO_TTL_SECS").unwrap_or(None),
        }
    }

    /// TTL configured for the given class.
    pub fn ttl_for(&self, class: BlobClass) -> Option<Duration> {
        match class {
            BlobClass::Video => self.video,
            BlobClass::Audio => self.audio,
        }
    }
}

fn ttl_from_env(var: &str) -> Option<Option<Duration>> {
    let secs: u64 = std::env::var(var).ok()?.parse().ok()?;
    Some((secs > 0).then(|| Duration::from_secs(secs)))
}

/// Whether an object created at `created_at` has outlived `ttl`.
pub(crate) fn is_expired(created_at: DateTime<Utc>, ttl: Option<Duration>) -> bool {
    match ttl.map(chrono::Duration::from_std) {
        Some(Ok(ttl)) => Utc::now().signed_duration_since(created_at) >= ttl,
        // No TTL, or a TTL too large to ever elapse.
        None | Some(Err(_)) => false,
    }
}
