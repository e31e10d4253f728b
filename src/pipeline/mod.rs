//! Pipeline stages for classifying and splitting a PDF bundle.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ classify ──▶ parse ──▶ split ──▶ cleanup
//! (upload)  (base64)   (Gemini)    (JSON)    (lopdf)   (best-effort)
//! ```
//!
//! 1. [`input`]: sanitise the upload name, check type and `%PDF` magic,
//!    store it under a scoped [`input::UploadGuard`]
//! 2. [`encode`]: base64-wrap the document for the JSON request body
//! 3. [`classify`]: the classification call with bounded retry; the only
//!    stage with network I/O
//! 4. [`parse`]: deterministic cleanup of the model text and descriptor
//!    normalisation
//! 5. [`split`]: page-range validation and extraction; CPU-bound, run
//!    on the blocking pool
//! 6. [`cleanup`]: remove transient uploads and, on demand, all artifacts

pub mod classify;
pub mod cleanup;
pub mod encode;
pub mod input;
pub mod parse;
pub mod split;
