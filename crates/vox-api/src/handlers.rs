//! HTTP handlers.

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use vox_models::{BlobId, JobId};

use crate::error::{IngestError, IngestResult};
use crate::ingest::{Requester, Upload};
use crate::state::AppState;

/// Upload response body.
#[derive(Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub blob_id: BlobId,
    pub job_id: JobId,
}

/// Accept a finished upload and hand it to the ingestor.
///
/// Identity comes from headers the auth layer in front of this service has
/// already verified; both values are opaque pass-through strings here.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> IngestResult<Json<UploadResponse>> {
    let requester = requester_from_headers(&headers)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| IngestError::invalid_input(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| IngestError::invalid_input(format!("failed to read upload: {e}")))?;

        upload = Some(Upload {
            bytes: bytes.to_vec(),
            content_type,
            filename,
        });
        break;
    }

    let upload = upload.ok_or_else(|| IngestError::invalid_input("no file provided"))?;
    let receipt = state.ingestor.ingest(upload, requester).await?;

    Ok(Json(UploadResponse {
        message: "file uploaded",
        blob_id: receipt.blob_id,
        job_id: receipt.job_id,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn requester_from_headers(headers: &HeaderMap) -> IngestResult<Requester> {
    let id = header_value(headers, "x-user-id")?;
    let contact = header_value(headers, "x-user-email")?;
    Ok(Requester { id, contact })
}

fn header_value(headers: &HeaderMap, name: &str) -> IngestResult<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| IngestError::unauthorized(format!("missing {name} header")))
}
