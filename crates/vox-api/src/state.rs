//! Application state.

use std::sync::Arc;

use vox_queue::RedisJobQueue;
use vox_store::S3BlobStore;

use crate::config::ApiConfig;
use crate::ingest::Ingestor;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    /// Create new application state with the production backends.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(S3BlobStore::from_env()?);
        store.check_connectivity().await?;

        let queue = Arc::new(RedisJobQueue::from_env()?);
        queue.init().await?;

        let ingestor = Arc::new(Ingestor::new(store, queue));

        Ok(Self { config, ingestor })
    }

    /// Build state around an existing ingestor (tests, custom backends).
    pub fn with_ingestor(config: ApiConfig, ingestor: Arc<Ingestor>) -> Self {
        Self { config, ingestor }
    }
}
