//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of independent consumer tasks. Each processes one job at a
    /// time; scaling is adding tasks or processes, not job parallelism.
    pub concurrency: usize,
    /// Upper bound on a single transcoding call.
    pub transcode_timeout: Duration,
    /// How long a consumer blocks on the queue before re-checking shutdown.
    pub receive_timeout: Duration,
    /// Blob store reaper cycle.
    pub reaper_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            transcode_timeout: Duration::from_secs(600),
            receive_timeout: Duration::from_secs(5),
            reaper_interval: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            concurrency: std::env::var("VOX_WORKER_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            transcode_timeout: Duration::from_secs(
                std::env::var("VOX_TRANSCODE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            receive_timeout: Duration::from_secs(
                std::env::var("VOX_WORKER_RECEIVE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            reaper_interval: Duration::from_secs(
                std::env::var("VOX_REAPER_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}
