//! In-memory blob store backend.
//!
//! Same contract as the S3 backend, held in process memory. Used by unit
//! and end-to-end tests and by local development setups without object
//! storage.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use vox_models::BlobId;

use crate::error::{StorageError, StorageResult};
use crate::store::{Blob, BlobStore, PutRequest};
use crate::ttl::{is_expired, TtlPolicy};

/// Blob store backed by a process-local map.
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<BlobId, Blob>>,
    ttl: TtlPolicy,
}

impl MemoryBlobStore {
    /// Create an empty store with the given expiry policy.
    pub fn new(ttl: TtlPolicy) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of objects currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new(TtlPolicy::default())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_with_id(&self, id: BlobId, request: PutRequest) -> StorageResult<()> {
        let blob = Blob {
            id: id.clone(),
            bytes: request.bytes,
            metadata: request.metadata,
            content_type: request.content_type,
            filename: request.filename,
            class: request.class,
            created_at: Utc::now(),
        };

        self.objects.write().await.insert(id, blob);
        Ok(())
    }

    async fn get(&self, id: &BlobId) -> StorageResult<Blob> {
        let objects = self.objects.read().await;
        let blob = objects.get(id).ok_or_else(|| StorageError::not_found(id.as_str()))?;

        if is_expired(blob.created_at, self.ttl.ttl_for(blob.class)) {
            return Err(StorageError::not_found(id.as_str()));
        }

        Ok(blob.clone())
    }

    async fn exists(&self, id: &BlobId) -> StorageResult<bool> {
        let objects = self.objects.read().await;
        Ok(objects
            .get(id)
            .is_some_and(|blob| !is_expired(blob.created_at, self.ttl.ttl_for(blob.class))))
    }

    async fn delete(&self, id: &BlobId) -> StorageResult<()> {
        self.objects.write().await.remove(id);
        Ok(())
    }

    async fn sweep_expired(&self) -> StorageResult<usize> {
        let mut objects = self.objects.write().await;
        let before = objects.len();
        objects.retain(|_, blob| !is_expired(blob.created_at, self.ttl.ttl_for(blob.class)));
        let removed = before - objects.len();

        if removed > 0 {
            debug!(removed, "swept expired blobs");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use vox_models::{meta, BlobClass};

    use super::*;

    fn short_video_ttl(ttl: Duration) -> TtlPolicy {
        TtlPolicy {
            video: Some(ttl),
            audio: None,
        }
    }

    #[tokio::test]
    async fn put_then_get_returns_content_and_metadata() {
        let store = MemoryBlobStore::new(TtlPolicy::keep_forever());

        let request = PutRequest::new(b"0123456789".to_vec(), BlobClass::Video)
            .with_content_type("video/mp4")
            .with_filename("clip.mp4")
            .with_metadata(meta::UPLOADED_BY, "u1");
        let id = store.put(request).await.expect("put");

        let blob = store.get(&id).await.expect("get");
        assert_eq!(blob.bytes, b"0123456789");
        assert_eq!(blob.content_type, "video/mp4");
        assert_eq!(blob.filename, "clip.mp4");
        assert_eq!(blob.class, BlobClass::Video);
        assert_eq!(blob.metadata[meta::UPLOADED_BY], "u1");
    }

    #[tokio::test]
    async fn each_put_assigns_a_fresh_id() {
        let store = MemoryBlobStore::new(TtlPolicy::keep_forever());

        let a = store
            .put(PutRequest::new(b"a".to_vec(), BlobClass::Video))
            .await
            .expect("put");
        let b = store
            .put(PutRequest::new(b"a".to_vec(), BlobClass::Video))
            .await
            .expect("put");

        assert_ne!(a, b);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = MemoryBlobStore::default();
        let err = store.get(&BlobId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn expired_blob_is_not_found_before_the_reaper_runs() {
        let store = MemoryBlobStore::new(short_video_ttl(Duration::from_millis(80)));

        let id = store
            .put(PutRequest::new(b"soon gone".to_vec(), BlobClass::Video))
            .await
            .expect("put");

        assert!(store.exists(&id).await.expect("exists"));

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(!store.exists(&id).await.expect("exists"));
        assert!(store.get(&id).await.unwrap_err().is_not_found());
        // Still physically present until a sweep happens.
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_classes() {
        let store = MemoryBlobStore::new(short_video_ttl(Duration::from_millis(50)));

        store
            .put(PutRequest::new(b"video".to_vec(), BlobClass::Video))
            .await
            .expect("put video");
        let audio_id = store
            .put(PutRequest::new(b"audio".to_vec(), BlobClass::Audio))
            .await
            .expect("put audio");

        tokio::time::sleep(Duration::from_millis(80)).await;

        let removed = store.sweep_expired().await.expect("sweep");
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.exists(&audio_id).await.expect("exists"));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryBlobStore::default();
        let id = BlobId::new();
        store.delete(&id).await.expect("delete unknown id");
    }
}
