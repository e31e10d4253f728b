//! Data types flowing between the classifier, the splitter and the caller.
//!
//! ```text
//! classifier ──▶ DocumentDescriptor ──▶ splitter ──▶ SplitArtifact
//!                                              └──▶ RejectedDescriptor
//! ```
//!
//! Every type here is `Serialize + Deserialize`; the HTTP layer returns them
//! verbatim and the CLI prints them with `--json`.

use crate::error::DescriptorError;
use serde::{Deserialize, Serialize};

/// One `{field, value}` pair the classifier considered relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyHighlight {
    pub field: String,
    pub value: String,
}

/// A logical sub-document the classifier found inside the source PDF.
///
/// Page numbers are 1-based and inclusive. They are signed because they come
/// from an external model: `0` or negative values must reach the splitter and
/// be rejected there, not break deserialisation of the whole response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    /// Short snake_case category label, e.g. `w2`, `paystub`, `bank_statement`.
    pub doc_type: String,
    /// Human-readable heading found on the document.
    pub title: String,
    pub page_start: i64,
    pub page_end: i64,
    /// Classification certainty in `[0.0, 1.0]`.
    pub confidence: f64,
    pub summary: String,
    #[serde(default)]
    pub key_highlights: Vec<KeyHighlight>,
}

impl DocumentDescriptor {
    /// Minimal descriptor for a page range; the remaining fields are empty.
    pub fn new(doc_type: impl Into<String>, page_start: i64, page_end: i64) -> Self {
        Self {
            doc_type: doc_type.into(),
            title: String::new(),
            page_start,
            page_end,
            confidence: 0.0,
            summary: String::new(),
            key_highlights: Vec::new(),
        }
    }
}

/// A descriptor that was materialised as a standalone PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitArtifact {
    #[serde(flatten)]
    pub descriptor: DocumentDescriptor,
    /// `{doc_type}_{ordinal}_pages_{start}-{end}.pdf`
    pub filename: String,
    /// Retrieval path, e.g. `/download/<batch>/w2_1_pages_1-2.pdf`.
    pub download_url: String,
    /// Pages in the written artifact.
    pub page_count: u32,
}

/// A descriptor that was dropped, with its 1-based input position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedDescriptor {
    pub ordinal: usize,
    pub doc_type: String,
    pub page_start: i64,
    pub page_end: i64,
    pub reason: DescriptorError,
}

/// Result of one split operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitOutput {
    /// Page count of the source PDF.
    pub total_pages: u32,
    /// Accepted descriptors in input order.
    pub artifacts: Vec<SplitArtifact>,
    /// Dropped descriptors in input order.
    pub rejected: Vec<RejectedDescriptor>,
}

/// Timings and counters for one processed upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessStats {
    pub descriptors_received: usize,
    pub artifacts_written: usize,
    pub descriptors_rejected: usize,
    pub classify_duration_ms: u64,
    pub split_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything returned for one submitted document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub message: String,
    /// Source file name as received (sanitised).
    pub filename: String,
    /// Artifact subdirectory for this request, when batches are isolated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub total_pages: u32,
    pub total_documents: usize,
    pub documents: Vec<SplitArtifact>,
    pub rejected: Vec<RejectedDescriptor>,
    pub stats: ProcessStats,
}

/// Basic facts about a PDF, available without an API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub page_count: u32,
    pub pdf_version: String,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_serializes_flat() {
        let artifact = SplitArtifact {
            descriptor: DocumentDescriptor {
                doc_type: "w2".into(),
                title: "Form W-2".into(),
                page_start: 1,
                page_end: 2,
                confidence: 0.97,
                summary: "Wage statement".into(),
                key_highlights: vec![KeyHighlight {
                    field: "tax_year".into(),
                    value: "2023".into(),
                }],
            },
            filename: "w2_1_pages_1-2.pdf".into(),
            download_url: "/download/w2_1_pages_1-2.pdf".into(),
            page_count: 2,
        };

        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["doc_type"], "w2");
        assert_eq!(json["page_start"], 1);
        assert_eq!(json["filename"], "w2_1_pages_1-2.pdf");
        assert_eq!(json["key_highlights"][0]["field"], "tax_year");
        assert!(json.get("descriptor").is_none());
    }

    #[test]
    fn descriptor_accepts_missing_highlights() {
        let json = r#"{"doc_type":"other","title":"t","page_start":1,"page_end":1,
                       "confidence":0.5,"summary":"s"}"#;
        let d: DocumentDescriptor = serde_json::from_str(json).unwrap();
        assert!(d.key_highlights.is_empty());
    }
}
