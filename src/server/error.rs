//! HTTP error mapping.
//!
//! Every failure leaves the service as `{"error": message, "code": CODE}`.
//! Caller mistakes are 4xx with a fixed message; everything else is a 500
//! carrying the underlying error text.

use crate::error::DocSplitError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The multipart body has no `file` field.
    #[error("No file uploaded")]
    NoFileUploaded,

    /// The request body exceeded the transport limit before it was read.
    #[error("File exceeds the {limit_mb} MB upload limit")]
    PayloadTooLarge { limit_mb: usize },

    /// The multipart body could not be parsed.
    #[error("Invalid multipart request: {0}")]
    BadMultipart(String),

    /// Unknown, malformed or missing artifact name.
    #[error("File not found")]
    FileNotFound,

    #[error(transparent)]
    Process(#[from] DocSplitError),
}

impl ApiError {
    /// Map a multipart read error, keeping axum's 413 for oversized bodies.
    pub fn from_multipart(err: MultipartError, limit_mb: usize) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge { limit_mb }
        } else {
            ApiError::BadMultipart(err.body_text())
        }
    }

    /// Status, machine-readable code and client-facing message.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::NoFileUploaded => (
                StatusCode::BAD_REQUEST,
                "NO_FILE_UPLOADED",
                self.to_string(),
            ),
            ApiError::PayloadTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
                self.to_string(),
            ),
            ApiError::BadMultipart(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", self.to_string())
            }
            ApiError::FileNotFound => (
                StatusCode::NOT_FOUND,
                "FILE_NOT_FOUND",
                self.to_string(),
            ),
            ApiError::Process(e) if e.is_input_error() => input_error_parts(e),
            ApiError::Process(DocSplitError::NoDocumentsFound) => (
                StatusCode::BAD_REQUEST,
                "NO_DOCUMENTS_FOUND",
                self.to_string(),
            ),
            ApiError::Process(other) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERVER_ERROR",
                format!("Server error: {other}"),
            ),
        }
    }
}

/// Fixed 4xx responses for rejected uploads.
fn input_error_parts(e: &DocSplitError) -> (StatusCode, &'static str, String) {
    match e {
        DocSplitError::NoFileSelected => (
            StatusCode::BAD_REQUEST,
            "NO_FILE_SELECTED",
            "No file selected".to_string(),
        ),
        DocSplitError::UploadTooLarge { limit_mb, .. } => (
            StatusCode::PAYLOAD_TOO_LARGE,
            "FILE_TOO_LARGE",
            format!("File exceeds the {limit_mb} MB upload limit"),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            "INVALID_FILE_TYPE",
            "Only PDF files are allowed".to_string(),
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status.as_u16(), message);
        }

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
