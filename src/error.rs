//! Error types for the docsplit library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocSplitError`] (**fatal**): the request cannot proceed at all
//!   (bad upload, unreadable PDF, classifier unreachable, artifact directory
//!   not writable). Returned as `Err(DocSplitError)` from the top-level
//!   `process*` functions and from the splitter.
//!
//! * [`DescriptorError`] (**non-fatal**): a single descriptor returned by the
//!   classifier could not be materialised (page range outside the source,
//!   extraction failed) but every other descriptor is fine. Stored inside
//!   [`crate::output::RejectedDescriptor`] so callers see exactly which
//!   sub-documents were dropped and why.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docsplit library.
///
/// Per-descriptor failures use [`DescriptorError`] and are stored in
/// [`crate::output::RejectedDescriptor`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DocSplitError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The upload did not carry a file name.
    #[error("No file selected")]
    NoFileSelected,

    /// The upload's extension is not one we split.
    #[error("Only PDF files are allowed (got '{filename}')")]
    UnsupportedFileType { filename: String },

    /// The bytes were read, but they are not a PDF.
    #[error("File is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The upload is larger than the configured bound.
    #[error("File exceeds the {limit_mb} MB upload limit ({size} bytes)")]
    UploadTooLarge { size: usize, limit_mb: usize },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF parsed, but its page tree is empty.
    #[error("PDF '{path}' has no pages")]
    EmptyPdf { path: PathBuf },

    // ── Classifier errors ─────────────────────────────────────────────────
    /// The classifier could not be constructed (missing API key etc.).
    #[error("Classifier '{provider}' is not configured: {hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The classification call exceeded the per-attempt timeout.
    #[error("Classification request timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// The request never produced an HTTP response (DNS, TLS, connection reset).
    #[error("Classification service unreachable: {detail}")]
    UpstreamUnavailable { detail: String },

    /// The classification service answered with a non-success status.
    #[error("Classification API error: {status} - {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The response had no candidate text, or the text is not the expected JSON.
    #[error("Malformed classification response: {detail}")]
    MalformedResponse { detail: String },

    /// The classifier found nothing to split.
    #[error("No documents found in the uploaded file")]
    NoDocumentsFound,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the artifact directory or write an artifact.
    #[error("Failed to write split document '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not store the transient upload.
    #[error("Failed to store upload '{path}': {source}")]
    UploadWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocSplitError {
    /// Whether a classification attempt that failed with this error may
    /// succeed if repeated.
    ///
    /// Timeouts, connection failures, rate limiting and 5xx gateway errors are
    /// transient. Authentication failures, bad requests and unparseable
    /// output are not.
    pub fn is_transient(&self) -> bool {
        match self {
            DocSplitError::ApiTimeout { .. } | DocSplitError::UpstreamUnavailable { .. } => true,
            DocSplitError::UpstreamStatus { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Whether the error was caused by the caller's input rather than by the
    /// service or its upstream.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DocSplitError::NoFileSelected
                | DocSplitError::UnsupportedFileType { .. }
                | DocSplitError::NotAPdf { .. }
                | DocSplitError::UploadTooLarge { .. }
        )
    }
}

/// A non-fatal error for a single descriptor.
///
/// Stored in [`crate::output::RejectedDescriptor`] when a descriptor is
/// dropped. The split continues with the next descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DescriptorError {
    /// `page_start` is below 1 or greater than `page_end`.
    #[error("Invalid page range {page_start}-{page_end}")]
    InvalidRange { page_start: i64, page_end: i64 },

    /// `page_end` points past the last page of the source.
    #[error("Page range {page_start}-{page_end} exceeds document length ({total_pages} pages)")]
    PageOutOfRange {
        page_start: i64,
        page_end: i64,
        total_pages: u32,
    },

    /// lopdf could not build or serialise the extracted document.
    #[error("Extracting pages {page_start}-{page_end} failed: {detail}")]
    ExtractionFailed {
        page_start: i64,
        page_end: i64,
        detail: String,
    },
}
