//! The blob store contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vox_models::{BlobClass, BlobId};

use crate::error::StorageResult;

/// A stored blob, as returned by [`BlobStore::get`].
#[derive(Debug, Clone)]
pub struct Blob {
    /// Unique id, assigned at creation, immutable.
    pub id: BlobId,
    /// Raw content.
    pub bytes: Vec<u8>,
    /// Free-form string metadata (`uploaded_by`, `original_video_id`, ...).
    pub metadata: HashMap<String, String>,
    /// Descriptive content type; non-authoritative.
    pub content_type: String,
    /// Descriptive filename; non-authoritative.
    pub filename: String,
    /// Object class selecting the expiry policy.
    pub class: BlobClass,
    /// Creation time; drives expiry.
    pub created_at: DateTime<Utc>,
}

/// Everything needed to store a new blob.
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub bytes: Vec<u8>,
    pub metadata: HashMap<String, String>,
    pub content_type: String,
    pub filename: String,
    pub class: BlobClass,
}

impl PutRequest {
    /// Create a request for raw bytes in the given object class.
    pub fn new(bytes: Vec<u8>, class: BlobClass) -> Self {
        Self {
            bytes,
            metadata: HashMap::new(),
            content_type: "application/octet-stream".to_string(),
            filename: String::new(),
            class,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Content-addressed-by-id storage for large binary objects.
///
/// Blobs are immutable once written; replacing content means storing a new
/// blob under a new id. `put` and `get` are safe to call concurrently from
/// any number of tasks. Expiry is the store's job: an expired id behaves
/// exactly like an unknown one.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob under a fresh unique id and return that id.
    async fn put(&self, request: PutRequest) -> StorageResult<BlobId> {
        let id = BlobId::new();
        self.put_with_id(id.clone(), request).await?;
        Ok(id)
    }

    /// Store a blob under a caller-chosen id.
    ///
    /// Used for derived objects whose id is a deterministic function of
    /// their source, so that a redelivered job overwrites the same object.
    async fn put_with_id(&self, id: BlobId, request: PutRequest) -> StorageResult<()>;

    /// Fetch a blob. Fails with `NotFound` when the id is unknown or the
    /// object has expired, even if the reaper has not swept it yet.
    async fn get(&self, id: &BlobId) -> StorageResult<Blob>;

    /// Existence probe with the same expiry semantics as [`get`](Self::get).
    async fn exists(&self, id: &BlobId) -> StorageResult<bool>;

    /// Remove a blob. Deleting an unknown id is not an error.
    async fn delete(&self, id: &BlobId) -> StorageResult<()>;

    /// Delete every object whose class TTL has elapsed; returns the number
    /// removed. Driven periodically by the [`Reaper`](crate::Reaper).
    async fn sweep_expired(&self) -> StorageResult<usize>;
}
