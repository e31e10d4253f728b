//! Range splitting: descriptors → standalone PDFs on disk.
//!
//! Each accepted descriptor becomes one artifact holding exactly pages
//! `page_start..=page_end` of the source, in their original order and with
//! their original content streams. Extraction is page-tree surgery on a
//! clone of the loaded document: delete every page outside the range (last
//! page first, so numbering stays valid), prune the objects nothing refers to
//! any more, save. Nothing is re-rendered or re-compressed.
//!
//! ## Failure isolation
//!
//! A descriptor whose range does not fit the source, or whose pages cannot
//! be extracted, is rejected and the next descriptor is tried. Faults of the
//! shared environment (corrupt source, output directory not writable, an
//! artifact that cannot be written or renamed) abort the whole split.
//!
//! Everything in here is synchronous and CPU-bound. Async callers run it on
//! `tokio::task::spawn_blocking`.

use crate::error::{DescriptorError, DocSplitError};
use crate::output::{DocumentDescriptor, RejectedDescriptor, SplitArtifact, SplitOutput};
use crate::progress::ProgressCallback;
use lopdf::Document;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What happened to a single descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutcome {
    Written(SplitArtifact),
    Rejected(RejectedDescriptor),
}

/// A loaded source PDF plus the place its artifacts go.
pub struct RangeSplitter {
    source: Document,
    source_path: PathBuf,
    total_pages: u32,
    output_dir: PathBuf,
    url_prefix: String,
}

impl std::fmt::Debug for RangeSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeSplitter")
            .field("source_path", &self.source_path)
            .field("total_pages", &self.total_pages)
            .field("output_dir", &self.output_dir)
            .field("url_prefix", &self.url_prefix)
            .finish()
    }
}

impl RangeSplitter {
    /// Parse the source and make sure `output_dir` exists.
    ///
    /// # Arguments
    /// * `source_path`: used only in error messages and logs
    /// * `bytes`: the source PDF
    /// * `output_dir`: directory receiving the artifacts
    /// * `url_prefix`: prepended to each file name to form `download_url`
    pub fn load(
        source_path: &Path,
        bytes: &[u8],
        output_dir: &Path,
        url_prefix: &str,
    ) -> Result<Self, DocSplitError> {
        let source = Document::load_mem(bytes).map_err(|e| DocSplitError::CorruptPdf {
            path: source_path.to_path_buf(),
            detail: e.to_string(),
        })?;

        let total_pages = source.get_pages().len() as u32;
        if total_pages == 0 {
            return Err(DocSplitError::EmptyPdf {
                path: source_path.to_path_buf(),
            });
        }

        std::fs::create_dir_all(output_dir).map_err(|e| DocSplitError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

        debug!(
            "Loaded {} ({} pages, PDF {})",
            source_path.display(),
            total_pages,
            source.version
        );

        Ok(Self {
            source,
            source_path: source_path.to_path_buf(),
            total_pages,
            output_dir: output_dir.to_path_buf(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        })
    }

    /// Page count of the source.
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Attempt one descriptor. `ordinal` is its 1-based input position.
    ///
    /// Returns `Ok(Rejected)` for faults that belong to the descriptor and
    /// `Err` only when the artifact could not be written.
    pub fn split_one(
        &self,
        ordinal: usize,
        descriptor: &DocumentDescriptor,
    ) -> Result<SplitOutcome, DocSplitError> {
        let reject = |reason: DescriptorError| {
            warn!(
                "Skipping document {} ({}): {}",
                ordinal, descriptor.doc_type, reason
            );
            Ok(SplitOutcome::Rejected(RejectedDescriptor {
                ordinal,
                doc_type: descriptor.doc_type.clone(),
                page_start: descriptor.page_start,
                page_end: descriptor.page_end,
                reason,
            }))
        };

        let (start, end) = match validate_range(descriptor, self.total_pages) {
            Ok(range) => range,
            Err(reason) => return reject(reason),
        };

        let bytes = match self.extract_range(start, end) {
            Ok(bytes) => bytes,
            Err(detail) => {
                return reject(DescriptorError::ExtractionFailed {
                    page_start: descriptor.page_start,
                    page_end: descriptor.page_end,
                    detail,
                })
            }
        };

        let filename = artifact_filename(&descriptor.doc_type, ordinal, start, end);
        let path = self.output_dir.join(&filename);
        write_atomic(&path, &bytes)?;

        debug!(
            "Wrote {} ({} pages, {} bytes)",
            path.display(),
            end - start + 1,
            bytes.len()
        );

        Ok(SplitOutcome::Written(SplitArtifact {
            descriptor: descriptor.clone(),
            download_url: format!("{}/{}", self.url_prefix, filename),
            filename,
            page_count: end - start + 1,
        }))
    }

    /// Attempt every descriptor in order.
    ///
    /// Rejected descriptors still consume their ordinal, so artifact names
    /// always reflect the input position.
    pub fn split_all(
        &self,
        descriptors: &[DocumentDescriptor],
        progress: Option<&ProgressCallback>,
    ) -> Result<SplitOutput, DocSplitError> {
        let total = descriptors.len();
        if let Some(cb) = progress {
            cb.on_split_start(self.total_pages, total);
        }

        let mut output = SplitOutput {
            total_pages: self.total_pages,
            ..Default::default()
        };

        for (idx, descriptor) in descriptors.iter().enumerate() {
            let ordinal = idx + 1;
            match self.split_one(ordinal, descriptor)? {
                SplitOutcome::Written(artifact) => {
                    if let Some(cb) = progress {
                        cb.on_artifact_written(ordinal, total, &artifact.filename);
                    }
                    output.artifacts.push(artifact);
                }
                SplitOutcome::Rejected(rejected) => {
                    if let Some(cb) = progress {
                        cb.on_descriptor_rejected(ordinal, total, &rejected.reason.to_string());
                    }
                    output.rejected.push(rejected);
                }
            }
        }

        info!(
            "Split {}: {} written, {} rejected",
            self.source_path.display(),
            output.artifacts.len(),
            output.rejected.len()
        );
        if let Some(cb) = progress {
            cb.on_complete(output.artifacts.len(), output.rejected.len());
        }
        Ok(output)
    }

    /// Serialise pages `start..=end` (1-based, already validated) as a new PDF.
    fn extract_range(&self, start: u32, end: u32) -> Result<Vec<u8>, String> {
        let mut doc = self.source.clone();

        // Delete in reverse so the remaining page numbers stay valid.
        let to_delete: Vec<u32> = (1..=self.total_pages)
            .rev()
            .filter(|p| *p < start || *p > end)
            .collect();
        for page in to_delete {
            doc.delete_pages(&[page]);
        }
        doc.prune_objects();

        let kept = doc.get_pages().len() as u32;
        if kept != end - start + 1 {
            return Err(format!(
                "expected {} pages after extraction, found {}",
                end - start + 1,
                kept
            ));
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| format!("save failed: {e}"))?;
        Ok(buffer)
    }
}

/// Check a descriptor's range against the source page count.
///
/// Returns the range as `u32`s when `1 <= page_start <= page_end <= total`.
pub fn validate_range(
    descriptor: &DocumentDescriptor,
    total_pages: u32,
) -> Result<(u32, u32), DescriptorError> {
    let (start, end) = (descriptor.page_start, descriptor.page_end);
    if start < 1 || start > end {
        return Err(DescriptorError::InvalidRange {
            page_start: start,
            page_end: end,
        });
    }
    if end > i64::from(total_pages) {
        return Err(DescriptorError::PageOutOfRange {
            page_start: start,
            page_end: end,
            total_pages,
        });
    }
    Ok((start as u32, end as u32))
}

/// `{doc_type}_{ordinal}_pages_{start}-{end}.pdf` with a filesystem-safe
/// `doc_type`.
pub fn artifact_filename(doc_type: &str, ordinal: usize, start: u32, end: u32) -> String {
    format!(
        "{}_{}_pages_{}-{}.pdf",
        safe_doc_type(doc_type),
        ordinal,
        start,
        end
    )
}

/// Keep `[a-z0-9_-]` of the lowercased label; `document` if nothing is left.
fn safe_doc_type(doc_type: &str) -> String {
    let safe: String = doc_type
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect();
    if safe.is_empty() {
        "document".to_string()
    } else {
        safe
    }
}

/// Write to a temporary file next to `path`, then rename over it.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocSplitError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let write_err = |source: std::io::Error| DocSplitError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
