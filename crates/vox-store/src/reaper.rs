//! Background expiry reaper.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::BlobStore;

/// Periodic task that physically removes expired blobs.
///
/// `get`/`exists` already hide expired objects, so the reaper only reclaims
/// space; its cycle bounds how long dead bytes linger.
pub struct Reaper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Spawn a reaper sweeping `store` every `interval`.
    pub fn spawn(store: Arc<dyn BlobStore>, interval: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a fresh store
            // is not swept before anything can expire.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match store.sweep_expired().await {
                            Ok(0) => {}
                            Ok(removed) => debug!(removed, "reaper swept expired blobs"),
                            Err(e) => warn!("reaper sweep failed: {e}"),
                        }
                    }
                }
            }

            info!("reaper stopped");
        });

        Self { shutdown, handle }
    }

    /// Stop the reaper and wait for the in-flight sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
