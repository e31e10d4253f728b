//! # docsplit
//!
//! Split a scanned or assembled PDF bundle (a mortgage application package,
//! say) into one PDF per logical document.
//!
//! A bundle is often dozens of unrelated documents glued together: W-2s, pay
//! stubs, bank statements, appraisals. This crate sends the whole file to a
//! Gemini model with a strict JSON response schema, receives one descriptor
//! per sub-document (type, title, page range, confidence, summary, key
//! fields) and cuts the source along those ranges with `lopdf`, without
//! re-rendering a single page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate name, type, size and %PDF magic; scoped upload
//!  ├─ 2. Encode    bytes → base64 inline data
//!  ├─ 3. Classify  Gemini generateContent + response schema (bounded retry)
//!  ├─ 4. Parse     clean model text, normalise descriptors
//!  ├─ 5. Split     validate ranges, extract pages (spawn_blocking)
//!  └─ 6. Output    artifacts + rejected descriptors + timings
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docsplit::{process_document, ProcessConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GEMINI_API_KEY
//!     let config = ProcessConfig::builder().output_dir("out").build()?;
//!     let output = process_document("loan_package.pdf", &config).await?;
//!     for doc in &output.documents {
//!         println!("{:<20} {}", doc.descriptor.doc_type, doc.download_url);
//!     }
//!     for skipped in &output.rejected {
//!         eprintln!("skipped #{}: {}", skipped.ordinal, skipped.reason);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum HTTP service ([`server`]) |
//! | `cli`    | on      | Enables the `docsplit` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable both when using only the library:
//! ```toml
//! docsplit = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ProcessConfig, ProcessConfigBuilder};
pub use error::{DescriptorError, DocSplitError};
pub use output::{
    DocumentDescriptor, KeyHighlight, ProcessOutput, ProcessStats, RejectedDescriptor,
    SourceMetadata, SplitArtifact, SplitOutput,
};
pub use pipeline::classify::{DocumentClassifier, GeminiClassifier};
pub use pipeline::cleanup::CleanupReport;
pub use pipeline::split::{RangeSplitter, SplitOutcome};
pub use process::{
    cleanup_all, inspect, process_document, process_from_bytes, process_sync, process_upload,
};
pub use progress::{NoopProgressCallback, ProcessProgressCallback, ProgressCallback};
pub use stream::{split_stream, split_stream_from_bytes, SplitStream};
