//! End-to-end pipeline tests on the in-memory backends:
//! ingest → queue → worker → store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use vox_api::{Ingestor, Requester, Upload};
use vox_models::{meta, BlobClass, BlobId};
use vox_queue::{MemoryCompletionChannel, MemoryJobQueue};
use vox_store::{
    Blob, BlobStore, MemoryBlobStore, PutRequest, Reaper, StorageError, StorageResult, TtlPolicy,
};
use vox_worker::{Executor, FixedExtractor, Processor, WorkerConfig};

const VIDEO: &[u8] = b"0123456789";
const AUDIO: &[u8] = b"derived audio bytes";

fn upload() -> Upload {
    Upload {
        bytes: VIDEO.to_vec(),
        content_type: "video/mp4".to_string(),
        filename: "clip.mp4".to_string(),
    }
}

fn requester() -> Requester {
    Requester {
        id: "u1".to_string(),
        contact: "u1@example.com".to_string(),
    }
}

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        concurrency: 2,
        transcode_timeout: Duration::from_secs(5),
        receive_timeout: Duration::from_millis(50),
        reaper_interval: Duration::from_millis(50),
    }
}

fn spawn_executor(
    store: Arc<dyn BlobStore>,
    queue: Arc<MemoryJobQueue>,
    notices: Arc<MemoryCompletionChannel>,
) -> (Arc<Executor>, tokio::task::JoinHandle<()>) {
    let processor = Arc::new(Processor::new(
        store,
        Arc::new(FixedExtractor::new(AUDIO)),
        Duration::from_secs(5),
    ));
    let executor = Arc::new(Executor::new(worker_config(), queue, processor, notices));

    let handle = {
        let executor = executor.clone();
        tokio::spawn(async move {
            executor.run().await.expect("executor run");
        })
    };
    (executor, handle)
}

async fn wait_for<F, Fut>(what: &str, mut probe: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if probe().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn upload_flows_through_to_stored_audio() {
    let store = Arc::new(MemoryBlobStore::new(TtlPolicy::keep_forever()));
    let queue = Arc::new(MemoryJobQueue::default());
    let notices = Arc::new(MemoryCompletionChannel::new());
    let mut notice_rx = notices.subscribe();

    // Ingest: blob stored, exactly one job referencing it.
    let ingestor = Ingestor::new(store.clone(), queue.clone());
    let receipt = ingestor.ingest(upload(), requester()).await.expect("ingest");

    let stored = store.get(&receipt.blob_id).await.expect("get video");
    assert_eq!(stored.bytes, VIDEO);
    assert_eq!(queue.depth().await, 1);

    // Worker side.
    let (executor, handle) = spawn_executor(store.clone(), queue.clone(), notices.clone());

    let derived_id = BlobId::derived_audio(&receipt.blob_id);
    wait_for("derived audio", || {
        let store = store.clone();
        let id = derived_id.clone();
        async move { store.exists(&id).await.expect("exists") }
    })
    .await;

    let audio = store.get(&derived_id).await.expect("get audio");
    assert_eq!(audio.bytes, AUDIO);
    assert_eq!(audio.class, BlobClass::Audio);
    assert_eq!(audio.metadata[meta::ORIGINAL_VIDEO_ID], receipt.blob_id.as_str());
    assert_eq!(audio.metadata[meta::UPLOADED_BY], "u1");

    // Job is acked and gone.
    wait_for("queue drain", || {
        let queue = queue.clone();
        async move { queue.depth().await == 0 && queue.in_flight().await == 0 }
    })
    .await;

    // Completion notice carries the lineage and the contact.
    let notice = notice_rx.recv().await.expect("notice");
    assert_eq!(notice.derived_blob_id, derived_id);
    assert_eq!(notice.original_blob_id, receipt.blob_id);
    assert_eq!(notice.requester_contact, "u1@example.com");

    executor.shutdown();
    handle.await.expect("join");
}

#[tokio::test]
async fn expired_source_fails_cleanly_and_the_queue_moves_on() {
    // Videos expire almost immediately; audio is kept.
    let store = Arc::new(MemoryBlobStore::new(TtlPolicy {
        video: Some(Duration::from_millis(150)),
        audio: None,
    }));
    let queue = Arc::new(MemoryJobQueue::default());
    let notices = Arc::new(MemoryCompletionChannel::new());

    let ingestor = Ingestor::new(store.clone(), queue.clone());
    let receipt = ingestor.ingest(upload(), requester()).await.expect("ingest");

    // Let the source expire before any worker runs, and let the reaper
    // collect it.
    let reaper = Reaper::spawn(store.clone(), Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!store.exists(&receipt.blob_id).await.expect("exists"));

    let (executor, handle) = spawn_executor(store.clone(), queue.clone(), notices.clone());

    // The job settles: acked and dropped, no derived blob, no stall.
    wait_for("queue drain", || {
        let queue = queue.clone();
        async move { queue.depth().await == 0 && queue.in_flight().await == 0 }
    })
    .await;
    assert!(!store
        .exists(&BlobId::derived_audio(&receipt.blob_id))
        .await
        .expect("exists"));

    // A later upload still flows through the same worker.
    let second = ingestor.ingest(upload(), requester()).await.expect("ingest");
    let second_derived = BlobId::derived_audio(&second.blob_id);
    wait_for("second derived audio", || {
        let store = store.clone();
        let id = second_derived.clone();
        async move { store.exists(&id).await.expect("exists") }
    })
    .await;

    executor.shutdown();
    handle.await.expect("join");
    reaper.shutdown().await;
}

/// Store whose first write is refused, as a briefly unreachable backend.
struct FlakyStore {
    inner: MemoryBlobStore,
    fail_next_put: AtomicBool,
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn put_with_id(&self, id: BlobId, request: PutRequest) -> StorageResult<()> {
        if self.fail_next_put.swap(false, Ordering::SeqCst) {
            return Err(StorageError::unavailable("transient outage"));
        }
        self.inner.put_with_id(id, request).await
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
async fn storing_fault_rides_redelivery_to_exactly_one_audio_blob() {
    let store = Arc::new(FlakyStore {
        inner: MemoryBlobStore::new(TtlPolicy::keep_forever()),
        fail_next_put: AtomicBool::new(false),
    });
    // Short lease so the unacked delivery comes back quickly.
    let queue = Arc::new(MemoryJobQueue::new(Duration::from_millis(150)));
    let notices = Arc::new(MemoryCompletionChannel::new());
    let mut notice_rx = notices.subscribe();

    let ingestor = Ingestor::new(store.clone(), queue.clone());
    let receipt = ingestor.ingest(upload(), requester()).await.expect("ingest");

    // The upload's own put is done; make the worker's Storing attempt the
    // one that fails.
    store.fail_next_put.store(true, Ordering::SeqCst);

    let (executor, handle) = spawn_executor(store.clone(), queue.clone(), notices.clone());

    let derived_id = BlobId::derived_audio(&receipt.blob_id);
    wait_for("derived audio after redelivery", || {
        let store = store.clone();
        let id = derived_id.clone();
        async move { store.exists(&id).await.expect("exists") }
    })
    .await;
    wait_for("queue drain", || {
        let queue = queue.clone();
        async move { queue.depth().await == 0 && queue.in_flight().await == 0 }
    })
    .await;

    // One source, one derived blob: redelivery converged on the same id.
    assert_eq!(store.inner.len().await, 2);

    let notice = tokio::time::timeout(Duration::from_secs(2), notice_rx.recv())
        .await
        .expect("notice in time")
        .expect("notice");
    assert_eq!(notice.derived_blob_id, derived_id);

    executor.shutdown();
    handle.await.expect("join");
}
