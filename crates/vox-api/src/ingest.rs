//! The ingestion producer.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use vox_models::{meta, BlobClass, BlobId, JobId, TranscodeJob};
use vox_queue::JobQueue;
use vox_store::{BlobStore, PutRequest};

use crate::error::{IngestError, IngestResult};

/// A finished upload handed over by the intake collaborator.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: String,
}

/// Already-authenticated requester identity; both fields are opaque here.
#[derive(Debug, Clone)]
pub struct Requester {
    pub id: String,
    pub contact: String,
}

/// What the caller gets back to correlate asynchronous completion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    pub blob_id: BlobId,
    pub job_id: JobId,
}

/// Accepts finished uploads: stores the video, then enqueues the job.
pub struct Ingestor {
    store: Arc<dyn BlobStore>,
    queue: Arc<dyn JobQueue>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn BlobStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    /// Validate, store, enqueue, strictly in that order.
    ///
    /// The job is enqueued only after `put` has durably returned, so a job
    /// never references a blob that does not yet exist. When `enqueue`
    /// fails afterwards the orphaned blob is accepted collateral: it
    /// carries the video TTL and self-expires.
    pub async fn ingest(&self, upload: Upload, requester: Requester) -> IngestResult<IngestReceipt> {
        if upload.bytes.is_empty() {
            return Err(IngestError::invalid_input("no file provided"));
        }
        if upload.filename.trim().is_empty() {
            return Err(IngestError::invalid_input("missing filename"));
        }

        let request = PutRequest::new(upload.bytes, BlobClass::Video)
            .with_content_type(upload.content_type)
            .with_filename(upload.filename)
            .with_metadata(meta::UPLOADED_BY, &requester.id)
            .with_metadata(meta::UPLOAD_TIME, Utc::now().to_rfc3339());

        let blob_id = self.store.put(request).await?;

        let job = TranscodeJob::new(blob_id.clone(), &requester.id, &requester.contact);
        let job_id = job.job_id.clone();
        self.queue.enqueue(&job).await?;

        info!(%blob_id, %job_id, requester = %requester.id, "upload stored, transcode job enqueued");
        Ok(IngestReceipt { blob_id, job_id })
    }
}
