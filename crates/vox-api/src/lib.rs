//! Upload ingestion service and its axum HTTP surface.
//!
//! This crate provides:
//! - The [`Ingestor`]: validate an upload, store the blob, enqueue the job
//! - `POST /upload` with requester identity from authenticated headers
//! - JSON error envelope with the ingestion error taxonomy

pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{IngestError, IngestResult};
pub use ingest::{IngestReceipt, Ingestor, Requester, Upload};
pub use routes::create_router;
pub use state::AppState;
