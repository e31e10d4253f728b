//! Progress-callback trait for per-request processing events.
//!
//! Inject an [`Arc<dyn ProcessProgressCallback>`] via
//! [`crate::config::ProcessConfigBuilder::progress_callback`] to receive
//! events as a document moves through classification and splitting. The CLI
//! drives its progress bar from these; a server could forward them to a
//! WebSocket. All methods default to no-ops.
//!
//! # Example
//!
//! ```rust
//! use docsplit::{ProcessConfig, ProcessProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl ProcessProgressCallback for CountingCallback {
//!     fn on_artifact_written(&self, _ordinal: usize, _total: usize, filename: &str) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("wrote {filename}");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//! let config = ProcessConfig::builder()
//!     .progress_callback(cb as Arc<dyn ProcessProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the processing pipeline as it works through one document.
///
/// Implementations must be `Send + Sync`: the splitter reports from the
/// blocking thread pool.
pub trait ProcessProgressCallback: Send + Sync {
    /// Called just before the classification request is sent.
    ///
    /// # Arguments
    /// * `size_bytes`: size of the source document
    fn on_classify_start(&self, size_bytes: usize) {
        let _ = size_bytes;
    }

    /// Called when the classifier returned (possibly zero) descriptors.
    fn on_classified(&self, descriptor_count: usize) {
        let _ = descriptor_count;
    }

    /// Called once the source is loaded and splitting begins.
    ///
    /// # Arguments
    /// * `total_pages`: page count of the source PDF
    /// * `descriptor_count`: descriptors that will be attempted
    fn on_split_start(&self, total_pages: u32, descriptor_count: usize) {
        let _ = (total_pages, descriptor_count);
    }

    /// Called after an artifact has been written.
    ///
    /// # Arguments
    /// * `ordinal`: 1-based position of the descriptor
    /// * `total`: number of descriptors
    /// * `filename`: artifact file name
    fn on_artifact_written(&self, ordinal: usize, total: usize, filename: &str) {
        let _ = (ordinal, total, filename);
    }

    /// Called when a descriptor is dropped.
    fn on_descriptor_rejected(&self, ordinal: usize, total: usize, reason: &str) {
        let _ = (ordinal, total, reason);
    }

    /// Called once after every descriptor has been attempted.
    fn on_complete(&self, written: usize, rejected: usize) {
        let _ = (written, rejected);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ProcessConfig`].
pub type ProgressCallback = Arc<dyn ProcessProgressCallback>;
