//! The opaque transcoding seam.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a successful extraction.
pub struct ExtractedAudio {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Given raw video bytes, produce raw audio bytes, or fail.
///
/// Implementations do not enforce a deadline themselves; the caller bounds
/// the call with a timeout.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    async fn extract(&self, video: &[u8]) -> Result<ExtractedAudio, ExtractError>;
}

/// Audio extraction via an ffmpeg subprocess.
pub struct FfmpegExtractor {
    ffmpeg_path: String,
}

impl FfmpegExtractor {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Create from environment variables (`VOX_FFMPEG_PATH`, default
    /// `ffmpeg` on PATH).
    pub fn from_env() -> Self {
        Self::new(std::env::var("VOX_FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()))
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    async fn extract(&self, video: &[u8]) -> Result<ExtractedAudio, ExtractError> {
        let dir = tempfile::tempdir()?;
        let input_path = dir.path().join("input");
        let output_path = dir.path().join("output.mp3");

        tokio::fs::write(&input_path, video).await?;

        debug!(bytes = video.len(), "extracting audio track");

        let output = tokio::process::Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(&input_path)
            .arg("-vn")
            .arg("-acodec")
            .arg("libmp3lame")
            .arg("-y")
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // The caller may time the call out; the subprocess must not
            // outlive the future.
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().last().unwrap_or("unknown error").to_string();
            return Err(ExtractError::Ffmpeg(tail));
        }

        let bytes = tokio::fs::read(&output_path).await?;
        Ok(ExtractedAudio {
            bytes,
            content_type: "audio/mpeg",
        })
    }
}

/// Extractor returning fixed bytes. Used by tests and wiring checks.
pub struct FixedExtractor {
    bytes: Vec<u8>,
}

impl FixedExtractor {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl AudioExtractor for FixedExtractor {
    async fn extract(&self, _video: &[u8]) -> Result<ExtractedAudio, ExtractError> {
        Ok(ExtractedAudio {
            bytes: self.bytes.clone(),
            content_type: "audio/mpeg",
        })
    }
}
