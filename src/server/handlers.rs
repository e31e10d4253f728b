//! Route handlers.

use super::error::ApiError;
use super::AppState;
use crate::error::DocSplitError;
use crate::output::ProcessOutput;
use crate::pipeline::cleanup::CleanupReport;
use crate::process;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Artifact names the splitter can produce.
static RE_ARTIFACT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_-]+_\d+_pages_\d+-\d+\.pdf$").unwrap());

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "AI-Document Processing Backend is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /process_document`
///
/// Expects `multipart/form-data` with the PDF in a field named `file`:
///
/// ```bash
/// curl -X POST http://localhost:5000/process_document -F "file=@loan_package.pdf"
/// ```
pub async fn process_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ProcessOutput>, ApiError> {
    let limit_mb = state.config.max_upload_mb();
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from_multipart(e, limit_mb))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::from_multipart(e, limit_mb))?;
            upload = Some((filename, data));
            break;
        }
    }

    let (filename, data) = upload.ok_or(ApiError::NoFileUploaded)?;
    debug!("Upload field received: {:?} ({} bytes)", filename, data.len());

    let output = process::process_upload(&data, &filename, &state.config).await?;
    Ok(Json(output))
}

/// `GET /download/{filename}`
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    if !RE_ARTIFACT_NAME.is_match(&filename) {
        return Err(ApiError::FileNotFound);
    }
    send_artifact(state.config.output_dir.join(&filename), &filename).await
}

/// `GET /download/{batch_id}/{filename}`
pub async fn download_batch(
    State(state): State<Arc<AppState>>,
    Path((batch_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let batch_ok = uuid::Uuid::parse_str(&batch_id)
        .map(|id| id.to_string() == batch_id)
        .unwrap_or(false);
    if !batch_ok || !RE_ARTIFACT_NAME.is_match(&filename) {
        return Err(ApiError::FileNotFound);
    }
    send_artifact(
        state.config.output_dir.join(&batch_id).join(&filename),
        &filename,
    )
    .await
}

/// `DELETE /split_documents`
pub async fn cleanup(State(state): State<Arc<AppState>>) -> Result<Json<CleanupReport>, ApiError> {
    let config = state.config.clone();
    let report = tokio::task::spawn_blocking(move || process::cleanup_all(&config))
        .await
        .map_err(|e| DocSplitError::Internal(format!("cleanup task failed: {e}")))?;
    info!("Cleanup requested: {} removed", report.removed);
    Ok(Json(report))
}

async fn send_artifact(path: PathBuf, filename: &str) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::FileNotFound)?;
    debug!("Serving {} ({} bytes)", path.display(), bytes.len());

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
