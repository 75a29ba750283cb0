//! Shared data models for the vox transcoding pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Blob and job identifiers
//! - The transcode job wire format
//! - Blob object classes and metadata keys
//! - Completion notices for downstream delivery

pub mod blob;
pub mod job;
pub mod notice;

// Re-export common types
pub use blob::{meta, BlobClass, BlobId};
pub use job::{JobId, TranscodeJob};
pub use notice::CompletionNotice;
