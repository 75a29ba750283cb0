//! Blob store for the vox pipeline.
//!
//! This crate provides:
//! - The [`BlobStore`] trait consumed by producer and worker
//! - An S3-compatible production backend
//! - An in-memory backend for tests and local development
//! - Per-class TTL policy enforced by a background [`Reaper`]

pub mod error;
pub mod memory;
pub mod reaper;
pub mod s3;
pub mod store;
pub mod ttl;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryBlobStore;
pub use reaper::Reaper;
pub use s3::{S3BlobStore, S3Config};
pub use store::{Blob, BlobStore, PutRequest};
pub use ttl::TtlPolicy;
