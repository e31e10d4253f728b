//! Document encoding: raw bytes → base64 inline data for the request body.
//!
//! Gemini accepts small documents (under ~20 MB of request payload) inline as
//! `{ "inline_data": { "mime_type": ..., "data": <base64> } }`. Standard
//! padded base64 is what the API expects.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use tracing::debug;

/// MIME type sent for PDF sources.
pub const PDF_MIME: &str = "application/pdf";

/// The `inline_data` part of a Gemini request.
#[derive(Debug, Clone, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Encode a document for transport.
pub fn encode_document(bytes: &[u8], mime_type: &str) -> InlineData {
    let data = STANDARD.encode(bytes);
    debug!(
        "Encoded {} bytes ({}) → {} bytes base64",
        bytes.len(),
        mime_type,
        data.len()
    );

    InlineData {
        mime_type: mime_type.to_string(),
        data,
    }
}
