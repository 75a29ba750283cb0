//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use vox_models::CompletionNotice;
use vox_queue::{CompletionSink, Delivery, JobQueue};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::processor::{JobOutcome, Processor};

/// Runs `concurrency` independent consumer tasks against a shared queue.
///
/// Each task pulls one job at a time and runs the processor's state
/// machine; nothing a single job does can take the loop down.
pub struct Executor {
    config: WorkerConfig,
    queue: Arc<dyn JobQueue>,
    processor: Arc<Processor>,
    notices: Arc<dyn CompletionSink>,
    shutdown: watch::Sender<bool>,
}

impl Executor {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn JobQueue>,
        processor: Arc<Processor>,
        notices: Arc<dyn CompletionSink>,
    ) -> Self {
        let (shutdown, _) = tokio::sync::watch::channel(false);
        Self {
            config,
            queue,
            processor,
            notices,
            shutdown,
        }
    }

    /// Run consumer tasks until [`shutdown`](Self::shutdown) is called.
    /// In-flight jobs finish before their task exits.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(consumers = self.config.concurrency, "starting job executor");

        let mut handles = Vec::with_capacity(self.config.concurrency);
        for index in 0..self.config.concurrency {
            let consumer = format!("worker-{}-{}", Uuid::new_v4(), index);
            let queue = Arc::clone(&self.queue);
            let processor = Arc::clone(&self.processor);
            let notices = Arc::clone(&self.notices);
            let receive_timeout = self.config.receive_timeout;
            let shutdown_rx = self.shutdown.subscribe();

            handles.push(tokio::spawn(consumer_loop(
                consumer,
                queue,
                processor,
                notices,
                receive_timeout,
                shutdown_rx,
            )));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("consumer task panicked: {e}");
            }
        }

        info!("job executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn consumer_loop(
    consumer: String,
    queue: Arc<dyn JobQueue>,
    processor: Arc<Processor>,
    notices: Arc<dyn CompletionSink>,
    receive_timeout: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(consumer, "consumer started");

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            result = queue.receive(&consumer, receive_timeout) => {
                match result {
                    Ok(Some(delivery)) => {
                        handle_delivery(&queue, &processor, &notices, delivery).await;
                    }
                    Ok(None) => {} // idle tick; loop to re-check shutdown
                    Err(e) => {
                        error!(consumer, "receive failed: {e}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }

    info!(consumer, "consumer stopped");
}

async fn handle_delivery(
    queue: &Arc<dyn JobQueue>,
    processor: &Arc<Processor>,
    notices: &Arc<dyn CompletionSink>,
    delivery: Delivery,
) {
    let Delivery { tag, job } = delivery;
    let job_id = job.job_id.clone();

    match processor.process(&job).await {
        Ok(outcome) => {
            let derived = outcome.derived_blob_id().cloned();

            // Settled either way: ack. For successes the derived blob is
            // already durably stored, which is the only thing an ack may
            // assume.
            if let Err(e) = queue.ack(&tag).await {
                // Redelivery will hit the idempotent fast path.
                error!(%job_id, "failed to ack settled job: {e}");
                return;
            }

            if let JobOutcome::Failed { .. } = outcome {
                return;
            }

            if let Some(derived_blob_id) = derived {
                let notice = CompletionNotice {
                    derived_blob_id,
                    original_blob_id: job.source_blob_id.clone(),
                    requester_contact: job.requester_contact.clone(),
                };
                if let Err(e) = notices.publish(&notice).await {
                    warn!(%job_id, "failed to publish completion notice: {e}");
                }
            }
        }
        Err(e) => {
            // Transient fault: leave the delivery unacked so the lease
            // lapses and the broker redelivers.
            warn!(%job_id, "job hit a transient fault, leaving for redelivery: {e}");
        }
    }
}
