//! End-to-end entry points: one document in, split artifacts out.
//!
//! A request is handled start to finish before returning:
//!
//! ```text
//! read / store upload ─▶ classify ─▶ split (blocking pool) ─▶ remove upload
//! ```
//!
//! Use [`crate::stream::split_stream`] instead when descriptors are already
//! known and artifacts should be reported one by one.

use crate::config::ProcessConfig;
use crate::error::DocSplitError;
use crate::output::{ProcessOutput, ProcessStats, SourceMetadata, SplitOutput};
use crate::pipeline::classify::{DocumentClassifier, GeminiClassifier};
use crate::pipeline::cleanup::{self, CleanupReport};
use crate::pipeline::encode::PDF_MIME;
use crate::pipeline::input;
use crate::pipeline::split::RangeSplitter;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Classify and split a PDF on disk.
///
/// # Returns
/// `Ok(ProcessOutput)` on success, even if some descriptors were rejected
/// (check `output.rejected`).
///
/// # Errors
/// Returns `Err(DocSplitError)` only for fatal errors:
/// - file not found / not a PDF / corrupt PDF
/// - classifier not configured, unreachable or returning garbage
/// - the classifier found no documents ([`DocSplitError::NoDocumentsFound`])
/// - an artifact could not be written
pub async fn process_document(
    path: impl AsRef<Path>,
    config: &ProcessConfig,
) -> Result<ProcessOutput, DocSplitError> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    process_path(path, name, config).await
}

/// Validate, store and process an uploaded PDF.
///
/// The upload is written under `config.upload_dir` with a unique name and
/// removed again before this function returns, whatever the outcome.
pub async fn process_upload(
    bytes: &[u8],
    original_filename: &str,
    config: &ProcessConfig,
) -> Result<ProcessOutput, DocSplitError> {
    let safe_name = input::validate_upload(original_filename, bytes, config.max_upload_bytes)?;
    let upload = input::save_upload(&config.upload_dir, &safe_name, bytes).await?;
    info!("Received upload: {} ({} bytes)", safe_name, bytes.len());

    let result = process_path(upload.path(), safe_name, config).await;
    drop(upload);
    result
}

/// Process PDF bytes held in memory.
///
/// The bytes go to a managed [`tempfile`] that is removed on return or panic.
///
/// # Example
/// ```rust,no_run
/// use docsplit::{process_from_bytes, ProcessConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("loan_package.pdf")?;
/// let output = process_from_bytes(&bytes, &ProcessConfig::default()).await?;
/// for doc in &output.documents {
///     println!("{} -> {}", doc.descriptor.doc_type, doc.filename);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn process_from_bytes(
    bytes: &[u8],
    config: &ProcessConfig,
) -> Result<ProcessOutput, DocSplitError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| DocSplitError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| DocSplitError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` lives until the split has finished.
    process_path(tmp.path(), "document.pdf".to_string(), config).await
}

/// Synchronous wrapper around [`process_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    path: impl AsRef<Path>,
    config: &ProcessConfig,
) -> Result<ProcessOutput, DocSplitError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocSplitError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_document(path, config))
}

/// Page count, version and size of a PDF.
///
/// Does not require an API key.
pub async fn inspect(path: impl AsRef<Path>) -> Result<SourceMetadata, DocSplitError> {
    let path = path.as_ref().to_path_buf();
    let bytes = input::read_local(&path).await?;
    input::check_pdf_magic(&path, &bytes)?;
    let size_bytes = bytes.len() as u64;

    tokio::task::spawn_blocking(move || -> Result<SourceMetadata, DocSplitError> {
        let doc = lopdf::Document::load_mem(&bytes).map_err(|e| DocSplitError::CorruptPdf {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        Ok(SourceMetadata {
            page_count: doc.get_pages().len() as u32,
            pdf_version: doc.version.clone(),
            size_bytes,
        })
    })
    .await
    .map_err(|e| DocSplitError::Internal(format!("inspect task failed: {e}")))?
}

/// Remove every artifact under `config.output_dir`.
pub fn cleanup_all(config: &ProcessConfig) -> CleanupReport {
    let report = cleanup::cleanup_split_documents(&config.output_dir);
    info!(
        "Cleanup of {}: {} removed, {} failed",
        config.output_dir.display(),
        report.removed,
        report.failed
    );
    report
}

/// The configured classifier, or a Gemini client built from the config.
pub fn resolve_classifier(
    config: &ProcessConfig,
) -> Result<Arc<dyn DocumentClassifier>, DocSplitError> {
    if let Some(ref classifier) = config.classifier {
        return Ok(Arc::clone(classifier));
    }
    Ok(Arc::new(GeminiClassifier::from_config(config)?))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn process_path(
    path: &Path,
    filename: String,
    config: &ProcessConfig,
) -> Result<ProcessOutput, DocSplitError> {
    let total_start = Instant::now();
    info!("Processing {}", path.display());

    // ── Step 1: Read source ──────────────────────────────────────────────
    let bytes = input::read_local(path).await?;
    input::check_pdf_magic(path, &bytes)?;

    // ── Step 2: Classify ─────────────────────────────────────────────────
    let classifier = resolve_classifier(config)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_classify_start(bytes.len());
    }
    let classify_start = Instant::now();
    let descriptors = classifier.classify(&bytes, PDF_MIME).await?;
    let classify_duration_ms = classify_start.elapsed().as_millis() as u64;
    info!(
        "{} classified {} documents in {}ms",
        classifier.name(),
        descriptors.len(),
        classify_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_classified(descriptors.len());
    }
    if descriptors.is_empty() {
        return Err(DocSplitError::NoDocumentsFound);
    }

    // ── Step 3: Split ────────────────────────────────────────────────────
    let batch_id = config
        .isolate_batches
        .then(|| uuid::Uuid::new_v4().to_string());
    let (output_dir, url_prefix) = artifact_location(config, batch_id.as_deref());
    debug!("Writing artifacts to {}", output_dir.display());

    let descriptors_received = descriptors.len();
    let split_start = Instant::now();
    let source_path = path.to_path_buf();
    let progress = config.progress_callback.clone();
    let batch_dir = batch_id.as_ref().map(|_| output_dir.clone());
    let split = tokio::task::spawn_blocking(move || -> Result<SplitOutput, DocSplitError> {
        let splitter = RangeSplitter::load(&source_path, &bytes, &output_dir, &url_prefix)?;
        splitter.split_all(&descriptors, progress.as_ref())
    })
    .await
    .map_err(|e| DocSplitError::Internal(format!("split task failed: {e}")))
    .and_then(|result| result);

    let split = match split {
        Ok(split) => split,
        Err(e) => {
            // Artifacts written before the failure are unreachable without
            // the batch id.
            if let Some(ref dir) = batch_dir {
                cleanup::discard_batch(dir);
            }
            return Err(e);
        }
    };
    let split_duration_ms = split_start.elapsed().as_millis() as u64;

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    let stats = ProcessStats {
        descriptors_received,
        artifacts_written: split.artifacts.len(),
        descriptors_rejected: split.rejected.len(),
        classify_duration_ms,
        split_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Processed {}: {}/{} documents written, {}ms total",
        filename, stats.artifacts_written, descriptors_received, stats.total_duration_ms
    );

    Ok(ProcessOutput {
        message: "Document processed successfully".to_string(),
        filename,
        batch_id,
        total_pages: split.total_pages,
        total_documents: split.artifacts.len(),
        documents: split.artifacts,
        rejected: split.rejected,
        stats,
    })
}

/// Artifact directory and URL prefix for one request.
fn artifact_location(config: &ProcessConfig, batch_id: Option<&str>) -> (PathBuf, String) {
    match batch_id {
        Some(id) => (
            config.output_dir.join(id),
            format!("{}/{}", config.download_prefix, id),
        ),
        None => (config.output_dir.clone(), config.download_prefix.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::DocumentDescriptor;
    use async_trait::async_trait;

    struct FixedClassifier(Vec<DocumentDescriptor>);

    #[async_trait]
    impl DocumentClassifier for FixedClassifier {
        async fn classify(
            &self,
            _document: &[u8],
            _mime_type: &str,
        ) -> Result<Vec<DocumentDescriptor>, DocSplitError> {
            Ok(self.0.clone())
        }
    }

    fn config(dir: &Path, docs: Vec<DocumentDescriptor>) -> ProcessConfig {
        ProcessConfig::builder()
            .upload_dir(dir.join("uploads"))
            .output_dir(dir.join("split"))
            .classifier(Arc::new(FixedClassifier(docs)))
            .build()
            .unwrap()
    }

    #[test]
    fn artifact_location_batches() {
        let c = ProcessConfig::default();
        let (dir, prefix) = artifact_location(&c, Some("abc"));
        assert_eq!(dir, PathBuf::from("split_documents/abc"));
        assert_eq!(prefix, "/download/abc");

        let (dir, prefix) = artifact_location(&c, None);
        assert_eq!(dir, PathBuf::from("split_documents"));
        assert_eq!(prefix, "/download");
    }

    #[test]
    fn resolve_prefers_injected_classifier() {
        let dir = tempfile::tempdir().unwrap();
        let c = config(dir.path(), vec![]);
        assert_eq!(resolve_classifier(&c).unwrap().name(), "custom");
    }

    #[tokio::test]
    async fn empty_classification_skips_split() {
        let dir = tempfile::tempdir().unwrap();
        let c = config(dir.path(), vec![]);
        let err = process_upload(b"%PDF-1.7\n%%EOF", "bundle.pdf", &c)
            .await
            .unwrap_err();

        assert!(matches!(err, DocSplitError::NoDocumentsFound));
        assert!(!dir.path().join("split").exists());
        assert_eq!(
            std::fs::read_dir(dir.path().join("uploads")).unwrap().count(),
            0
        );
    }

    #[tokio::test]
    async fn upload_is_validated_before_classifying() {
        let dir = tempfile::tempdir().unwrap();
        let c = config(dir.path(), vec![DocumentDescriptor::new("w2", 1, 1)]);
        let err = process_upload(b"hello", "notes.txt", &c).await.unwrap_err();
        assert!(matches!(err, DocSplitError::UnsupportedFileType { .. }));
        assert!(!dir.path().join("uploads").exists());
    }

    #[test]
    fn cleanup_all_on_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let c = config(&dir.path().join("nothing"), vec![]);
        assert_eq!(cleanup_all(&c), CleanupReport::default());
    }
}
