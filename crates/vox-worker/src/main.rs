//! Transcode worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vox_queue::{CompletionChannel, RedisJobQueue, RedisQueueConfig};
use vox_store::{Reaper, S3BlobStore};
use vox_worker::{Executor, FfmpegExtractor, Processor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting vox-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let store: Arc<S3BlobStore> = match S3BlobStore::from_env() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create blob store: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = store.check_connectivity().await {
        error!("Blob store unreachable: {}", e);
        std::process::exit(1);
    }

    let queue_config = RedisQueueConfig::from_env();
    let redis_url = queue_config.redis_url.clone();
    let queue = match RedisJobQueue::new(queue_config) {
        Ok(q) => Arc::new(q),
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = queue.init().await {
        error!("Failed to initialize job queue: {}", e);
        std::process::exit(1);
    }

    let notices = match CompletionChannel::new(&redis_url) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to create completion channel: {}", e);
            std::process::exit(1);
        }
    };

    // The worker process hosts the store's expiry reaper.
    let reaper = Reaper::spawn(store.clone(), config.reaper_interval);

    let processor = Arc::new(Processor::new(
        store,
        Arc::new(FfmpegExtractor::from_env()),
        config.transcode_timeout,
    ));
    let executor = Arc::new(Executor::new(config, queue, processor, notices));

    // Shut down on ctrl-c; in-flight jobs finish first.
    {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            executor.shutdown();
        });
    }

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    reaper.shutdown().await;

    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vox=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
