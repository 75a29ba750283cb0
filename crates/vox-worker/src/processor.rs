//! Per-job state machine.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use vox_models::{meta, BlobClass, BlobId, TranscodeJob};
use vox_store::{BlobStore, PutRequest};

use crate::error::WorkerResult;
use crate::extractor::AudioExtractor;

/// Phases a job moves through. `Failed` is reachable from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Received,
    Fetching,
    Transcoding,
    Storing,
    Acking,
    Failed,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Received => "received",
            JobPhase::Fetching => "fetching",
            JobPhase::Transcoding => "transcoding",
            JobPhase::Storing => "storing",
            JobPhase::Acking => "acking",
            JobPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How processing a job ended.
///
/// Every variant is acked by the executor; transient trouble surfaces as a
/// `WorkerError` instead and leaves the delivery unacked for redelivery.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// Derived audio freshly stored.
    Completed { derived_blob_id: BlobId },
    /// A previous delivery of this job already stored the audio.
    AlreadyStored { derived_blob_id: BlobId },
    /// Terminal failure; retrying would reproduce it.
    Failed { phase: JobPhase, reason: String },
}

impl JobOutcome {
    /// The derived blob id, when processing produced (or found) one.
    pub fn derived_blob_id(&self) -> Option<&BlobId> {
        match self {
            JobOutcome::Completed { derived_blob_id }
            | JobOutcome::AlreadyStored { derived_blob_id } => Some(derived_blob_id),
            JobOutcome::Failed { .. } => None,
        }
    }
}

/// Runs the `Received → Fetching → Transcoding → Storing` pipeline for one
/// job at a time.
pub struct Processor {
    store: Arc<dyn BlobStore>,
    extractor: Arc<dyn AudioExtractor>,
    transcode_timeout: Duration,
}

impl Processor {
    pub fn new(
        store: Arc<dyn BlobStore>,
        extractor: Arc<dyn AudioExtractor>,
        transcode_timeout: Duration,
    ) -> Self {
        Self {
            store,
            extractor,
            transcode_timeout,
        }
    }

    /// Process a single delivery.
    ///
    /// `Ok(outcome)` means the delivery is settled and must be acked,
    /// whether it succeeded or failed terminally. `Err` means a transient
    /// fault: leave the delivery unacked so the broker redelivers it.
    pub async fn process(&self, job: &TranscodeJob) -> WorkerResult<JobOutcome> {
        let job_id = &job.job_id;
        let started = Instant::now();
        debug!(%job_id, source = %job.source_blob_id, phase = %JobPhase::Received, "processing job");

        // Redelivery fast path: the derived id is deterministic, so a
        // finished earlier delivery is visible here.
        let derived_id = BlobId::derived_audio(&job.source_blob_id);
        if self.store.exists(&derived_id).await? {
            info!(%job_id, derived = %derived_id, "derived audio already stored, skipping");
            return Ok(JobOutcome::AlreadyStored {
                derived_blob_id: derived_id,
            });
        }

        // Fetching
        let phase_started = Instant::now();
        let source = match self.store.get(&job.source_blob_id).await {
            Ok(blob) => blob,
            Err(e) if e.is_not_found() => {
                return Ok(self.fail(job, JobPhase::Fetching, "source blob missing or expired", started));
            }
            Err(e) => return Err(e.into()),
        };
        debug!(
            %job_id,
            phase = %JobPhase::Fetching,
            bytes = source.bytes.len(),
            elapsed_ms = phase_started.elapsed().as_millis() as u64,
            "fetched source blob"
        );

        // Transcoding, bounded so a wedged transcode cannot starve the
        // queue of this consumer.
        let phase_started = Instant::now();
        let audio = match tokio::time::timeout(
            self.transcode_timeout,
            self.extractor.extract(&source.bytes),
        )
        .await
        {
            Ok(Ok(audio)) => audio,
            Ok(Err(e)) => {
                return Ok(self.fail(job, JobPhase::Transcoding, &e.to_string(), started));
            }
            Err(_) => {
                let reason = format!(
                    "timed out after {}s",
                    self.transcode_timeout.as_secs()
                );
                return Ok(self.fail(job, JobPhase::Transcoding, &reason, started));
            }
        };
        debug!(
            %job_id,
            phase = %JobPhase::Transcoding,
            bytes = audio.bytes.len(),
            elapsed_ms = phase_started.elapsed().as_millis() as u64,
            "extracted audio track"
        );

        // Storing. Errors here are transient by definition (the store was
        // reachable moments ago), so they bubble up and ride redelivery.
        let request = PutRequest::new(audio.bytes, BlobClass::Audio)
            .with_content_type(audio.content_type)
            .with_filename(format!("{}.mp3", job.source_blob_id))
            .with_metadata(meta::ORIGINAL_VIDEO_ID, job.source_blob_id.as_str())
            .with_metadata(meta::UPLOADED_BY, &job.requester_id);
        self.store.put_with_id(derived_id.clone(), request).await?;

        info!(
            %job_id,
            derived = %derived_id,
            outcome = "completed",
            elapsed_ms = started.elapsed().as_millis() as u64,
            "stored derived audio"
        );
        Ok(JobOutcome::Completed {
            derived_blob_id: derived_id,
        })
    }

    fn fail(
        &self,
        job: &TranscodeJob,
        phase: JobPhase,
        reason: &str,
        started: Instant,
    ) -> JobOutcome {
        warn!(
            job_id = %job.job_id,
            phase = %phase,
            reason,
            outcome = "failed",
            elapsed_ms = started.elapsed().as_millis() as u64,
            "job failed terminally"
        );
        JobOutcome::Failed {
            phase,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use vox_store::{Blob, MemoryBlobStore, StorageError, StorageResult, TtlPolicy};

    use crate::extractor::{ExtractError, ExtractedAudio, FixedExtractor};

    use super::*;

    const AUDIO: &[u8] = b"fixed audio bytes";

    fn processor(store: Arc<dyn BlobStore>) -> Processor {
        Processor::new(
            store,
            Arc::new(FixedExtractor::new(AUDIO)),
            Duration::from_secs(5),
        )
    }

    async fn stored_video(store: &MemoryBlobStore) -> BlobId {
        store
            .put(PutRequest::new(b"raw video".to_vec(), BlobClass::Video))
            .await
            .expect("put video")
    }

    fn job_for(source: &BlobId) -> TranscodeJob {
        TranscodeJob::new(source.clone(), "u1", "u1@example.com")
    }

    #[tokio::test]
    async fn stores_derived_audio_with_lineage_metadata() {
        let store = Arc::new(MemoryBlobStore::new(TtlPolicy::keep_forever()));
        let source = stored_video(&store).await;

        let outcome = processor(store.clone())
            .process(&job_for(&source))
            .await
            .expect("process");

        let derived_id = match outcome {
            JobOutcome::Completed { derived_blob_id } => derived_blob_id,
            other => panic!("unexpected outcome: {other:?}"),
        };

        let audio = store.get(&derived_id).await.expect("get audio");
        assert_eq!(audio.bytes, AUDIO);
        assert_eq!(audio.class, BlobClass::Audio);
        assert_eq!(audio.content_type, "audio/mpeg");
        assert_eq!(audio.metadata[meta::ORIGINAL_VIDEO_ID], source.as_str());
        assert_eq!(audio.metadata[meta::UPLOADED_BY], "u1");
    }

    #[tokio::test]
    async fn missing_source_fails_terminally_in_fetching() {
        let store = Arc::new(MemoryBlobStore::new(TtlPolicy::keep_forever()));

        let job = job_for(&BlobId::new());
        let outcome = processor(store.clone()).process(&job).await.expect("process");

        match outcome {
            JobOutcome::Failed { phase, .. } => assert_eq!(phase, JobPhase::Fetching),
            other => panic!("unexpected outcome: {other:?}"),
        }
        // No derived blob was created.
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn redelivery_is_idempotent() {
        let store = Arc::new(MemoryBlobStore::new(TtlPolicy::keep_forever()));
        let source = stored_video(&store).await;
        let processor = processor(store.clone());
        let job = job_for(&source);

        let first = processor.process(&job).await.expect("first delivery");
        let second = processor.process(&job).await.expect("second delivery");

        let first_id = first.derived_blob_id().expect("derived id").clone();
        assert!(matches!(second, JobOutcome::AlreadyStored { ref derived_blob_id } if *derived_blob_id == first_id));

        // Exactly one derived blob exists: the source plus one audio object.
        assert_eq!(store.len().await, 2);
    }

    struct BrokenExtractor;

    #[async_trait]
    impl AudioExtractor for BrokenExtractor {
        async fn extract(&self, _video: &[u8]) -> Result<ExtractedAudio, ExtractError> {
            Err(ExtractError::Ffmpeg("corrupt input".to_string()))
        }
    }

    #[tokio::test]
    async fn transcode_failure_is_terminal() {
        let store = Arc::new(MemoryBlobStore::new(TtlPolicy::keep_forever()));
        let source = stored_video(&store).await;

        let processor = Processor::new(
            store.clone(),
            Arc::new(BrokenExtractor),
            Duration::from_secs(5),
        );
        let outcome = processor
            .process(&job_for(&source))
            .await
            .expect("process");

        match outcome {
            JobOutcome::Failed { phase, reason } => {
                assert_eq!(phase, JobPhase::Transcoding);
                assert!(reason.contains("corrupt input"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    struct HangingExtractor;

    #[async_trait]
    impl AudioExtractor for HangingExtractor {
        async fn extract(&self, _video: &[u8]) -> Result<ExtractedAudio, ExtractError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("the timeout fires first")
        }
    }

    #[tokio::test]
    async fn wedged_transcode_times_out_terminally() {
        let store = Arc::new(MemoryBlobStore::new(TtlPolicy::keep_forever()));
        let source = stored_video(&store).await;

        let processor = Processor::new(
            store.clone(),
            Arc::new(HangingExtractor),
            Duration::from_millis(50),
        );
        let outcome = processor
            .process(&job_for(&source))
            .await
            .expect("process");

        match outcome {
            JobOutcome::Failed { phase, reason } => {
                assert_eq!(phase, JobPhase::Transcoding);
                assert!(reason.contains("timed out"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    /// Store whose writes fail while reads keep working.
    struct ReadOnlyStore {
        inner: MemoryBlobStore,
    }

    #[async_trait]
    impl BlobStore for ReadOnlyStore {
        async fn put_with_id(&self, _id: BlobId, _request: PutRequest) -> StorageResult<()> {
            Err(StorageError::unavailable("write refused"))
        }

        async fn get(&self, id: &BlobId) -> StorageResult<Blob> {
            self.inner.get(id).await
        }

        async fn exists(&self, id: &BlobId) -> StorageResult<bool> {
            self.inner.exists(id).await
        }

        async fn delete(&self, id: &BlobId) -> StorageResult<()> {
            self.inner.delete(id).await
        }

        async fn sweep_expired(&self) -> StorageResult<usize> {
            self.inner.sweep_expired().await
        }
    }

    #[tokio::test]
    async fn storing_failure_is_transient_not_terminal() {
        let inner = MemoryBlobStore::new(TtlPolicy::keep_forever());
        let source = stored_video(&inner).await;
        let store = Arc::new(ReadOnlyStore { inner });

        let err = processor(store).process(&job_for(&source)).await.unwrap_err();
        assert!(matches!(
            err,
            crate::WorkerError::Storage(StorageError::Unavailable(_))
        ));
    }
}
