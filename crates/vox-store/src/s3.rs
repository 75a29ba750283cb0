//! S3-compatible blob store backend.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tracing::debug;

use vox_models::{BlobClass, BlobId};

use crate::error::{StorageError, StorageResult};
use crate::store::{Blob, BlobStore, PutRequest};
use crate::ttl::{is_expired, TtlPolicy};

// Reserved object-metadata keys; everything else is caller metadata.
const META_CLASS: &str = "vox-class";
const META_CREATED_AT: &str = "vox-created-at";
const META_FILENAME: &str = "vox-filename";

/// Configuration for the S3 backend.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 API endpoint URL (R2, minio, or AWS proper)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("VOX_S3_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("VOX_S3_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("VOX_S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("VOX_S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("VOX_S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("VOX_S3_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("VOX_S3_BUCKET")
                .map_err(|_| StorageError::config_error("VOX_S3_BUCKET not set"))?,
            region: std::env::var("VOX_S3_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Blob store on an S3-compatible bucket.
///
/// Blob metadata and the creation timestamp live in object metadata; expiry
/// is checked inline on reads and enforced physically by
/// [`sweep_expired`](BlobStore::sweep_expired).
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    ttl: TtlPolicy,
}

impl S3BlobStore {
    /// Create a new store from configuration.
    pub fn new(config: S3Config, ttl: TtlPolicy) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vox",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            ttl,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(S3Config::from_env()?, TtlPolicy::from_env()))
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::unavailable(format!("connectivity check failed: {e}")))?;
        Ok(())
    }

    fn object_metadata(id: &BlobId, request: &PutRequest) -> HashMap<String, String> {
        let mut metadata = request.metadata.clone();
        metadata.insert(META_CLASS.to_string(), request.class.as_str().to_string());
        metadata.insert(META_CREATED_AT.to_string(), Utc::now().to_rfc3339());
        metadata.insert(META_FILENAME.to_string(), request.filename.clone());
        debug!(%id, class = %request.class, "storing blob");
        metadata
    }

    /// Split object metadata into (caller metadata, class, created_at).
    fn parse_metadata(
        id: &BlobId,
        mut metadata: HashMap<String, String>,
    ) -> StorageResult<(HashMap<String, String>, BlobClass, DateTime<Utc>)> {
        let class = match metadata.remove(META_CLASS).as_deref() {
            Some("audio") => BlobClass::Audio,
            _ => BlobClass::Video,
        };

        let created_at = metadata
            .remove(META_CREATED_AT)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                StorageError::InvalidKey(format!("blob {id} has no creation timestamp"))
            })?;

        metadata.remove(META_FILENAME);
        Ok((metadata, class, created_at))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_with_id(&self, id: BlobId, request: PutRequest) -> StorageResult<()> {
        let metadata = Self::object_metadata(&id, &request);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(id.as_str())
            .body(ByteStream::from(request.bytes))
            .content_type(&request.content_type)
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| StorageError::unavailable(format!("put failed: {e}")))?;

        Ok(())
    }

    async fn get(&self, id: &BlobId) -> StorageResult<Blob> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(id.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(id.as_str())
                } else {
                    StorageError::unavailable(format!("get failed: {e}"))
                }
            })?;

        let content_type = response
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let filename = response
            .metadata()
            .and_then(|m| m.get(META_FILENAME))
            .cloned()
            .unwrap_or_default();
        let raw_metadata = response.metadata().cloned().unwrap_or_default();
        let (metadata, class, created_at) = Self::parse_metadata(id, raw_metadata)?;

        if is_expired(created_at, self.ttl.ttl_for(class)) {
            return Err(StorageError::not_found(id.as_str()));
        }

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::unavailable(format!("get failed: {e}")))?
            .into_bytes()
            .to_vec();

        Ok(Blob {
            id: id.clone(),
            bytes,
            metadata,
            content_type,
            filename,
            class,
            created_at,
        })
    }

    async fn exists(&self, id: &BlobId) -> StorageResult<bool> {
        let response = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(id.as_str())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("NotFound") || msg.contains("NoSuchKey") {
                    return Ok(false);
                }
                return Err(StorageError::unavailable(format!("head failed: {msg}")));
            }
        };

        let raw_metadata = response.metadata().cloned().unwrap_or_default();
        let (_, class, created_at) = Self::parse_metadata(id, raw_metadata)?;
        Ok(!is_expired(created_at, self.ttl.ttl_for(class)))
    }

    async fn delete(&self, id: &BlobId) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(id.as_str())
            .send()
            .await
            .map_err(|e| StorageError::unavailable(format!("delete failed: {e}")))?;

        Ok(())
    }

    async fn sweep_expired(&self) -> StorageResult<usize> {
        let mut expired = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::unavailable(format!("list failed: {e}")))?;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                let id = BlobId::from_string(key);

                // head per key: expiry depends on per-class metadata, not
                // on anything the listing carries.
                if let Ok(head) = self
                    .client
                    .head_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send()
                    .await
                {
                    let raw_metadata = head.metadata().cloned().unwrap_or_default();
                    if let Ok((_, class, created_at)) = Self::parse_metadata(&id, raw_metadata) {
                        if is_expired(created_at, self.ttl.ttl_for(class)) {
                            expired.push(key.to_string());
                        }
                    }
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(String::from);
            } else {
                break;
            }
        }

        if expired.is_empty() {
            return Ok(0);
        }

        let objects: Vec<_> = expired
            .iter()
            .filter_map(|k| {
                aws_sdk_s3::types::ObjectIdentifier::builder()
                    .key(k)
                    .build()
                    .ok()
            })
            .collect();

        let delete = aws_sdk_s3::types::Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| StorageError::unavailable(format!("delete batch failed: {e}")))?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| StorageError::unavailable(format!("delete batch failed: {e}")))?;

        debug!(removed = expired.len(), "swept expired blobs");
        Ok(expired.len())
    }
}
