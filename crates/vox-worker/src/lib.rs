//! Transcode worker.
//!
//! This crate provides:
//! - The [`AudioExtractor`] seam around the opaque transcoding function
//! - The per-job state machine ([`Processor`])
//! - The [`Executor`]: N consumer tasks over a shared queue handle

pub mod config;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod processor;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::Executor;
pub use extractor::{AudioExtractor, ExtractError, ExtractedAudio, FfmpegExtractor, FixedExtractor};
pub use processor::{JobOutcome, JobPhase, Processor};
