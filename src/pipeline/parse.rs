//! Response parsing: model text → normalised [`DocumentDescriptor`]s.
//!
//! Even with `responseMimeType = application/json` and a strict schema, model
//! output occasionally arrives wrapped in a ```` ```json ```` fence, prefixed
//! with a BOM, or with a `doc_type` that is not quite snake_case. The rules
//! here are deterministic and run in a fixed order:
//!
//! 1. Normalise line endings (CRLF → LF)
//! 2. Strip invisible Unicode (BOM, zero-width characters)
//! 3. Strip an outer code fence
//! 4. Deserialise `{ "documents": [...] }`, falling back to the outermost
//!    `{ ... }` span when the model added prose around the object
//! 5. Normalise each descriptor (`doc_type`, `confidence`, whitespace)
//!
//! Page numbers are left untouched: validating them is the splitter's job.

use crate::error::DocSplitError;
use crate::output::DocumentDescriptor;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DocumentsEnvelope {
    documents: Vec<DocumentDescriptor>,
}

/// Parse the model's text into normalised descriptors.
///
/// An empty `documents` array is a valid result; a missing `documents` key or
/// text that is not JSON is [`DocSplitError::MalformedResponse`].
pub fn parse_documents(text: &str) -> Result<Vec<DocumentDescriptor>, DocSplitError> {
    let cleaned = clean_response_text(text);
    if cleaned.is_empty() {
        return Err(DocSplitError::MalformedResponse {
            detail: "empty response text".into(),
        });
    }

    let envelope: DocumentsEnvelope = match serde_json::from_str(&cleaned) {
        Ok(env) => env,
        Err(first_err) => match outer_object(&cleaned) {
            Some(span) if span.len() < cleaned.len() => serde_json::from_str(span).map_err(|e| {
                DocSplitError::MalformedResponse {
                    detail: format!("invalid documents JSON: {e}"),
                }
            })?,
            _ => {
                return Err(DocSplitError::MalformedResponse {
                    detail: format!("invalid documents JSON: {first_err}"),
                })
            }
        },
    };

    Ok(envelope
        .documents
        .into_iter()
        .map(normalise_descriptor)
        .collect())
}

/// Apply rules 1–3 to raw model text.
pub fn clean_response_text(input: &str) -> String {
    let s = input.replace("\r\n", "\n");
    let s = remove_invisible_chars(&s);
    strip_code_fences(s.trim()).trim().to_string()
}

// ── Rule 2: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}'))
        .collect()
}

// ── Rule 3: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```$").unwrap());

fn strip_code_fences(input: &str) -> &str {
    match RE_OUTER_FENCE.captures(input).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => input,
    }
}

// ── Rule 4 fallback: outermost object ────────────────────────────────────────

fn outer_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    (end > start).then(|| &input[start..=end])
}

// ── Rule 5: Descriptor normalisation ─────────────────────────────────────────

static RE_NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lowercase snake_case label; `other` when nothing usable remains.
pub fn normalise_doc_type(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let slug = RE_NON_SLUG.replace_all(&lower, "_");
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "other".to_string()
    } else {
        slug.to_string()
    }
}

/// Normalise label, confidence and whitespace of one descriptor.
pub fn normalise_descriptor(mut d: DocumentDescriptor) -> DocumentDescriptor {
    d.doc_type = normalise_doc_type(&d.doc_type);
    d.title = d.title.trim().to_string();
    d.summary = d.summary.trim().to_string();
    d.confidence = if d.confidence.is_nan() {
        0.0
    } else {
        d.confidence.clamp(0.0, 1.0)
    };
    for h in &mut d.key_highlights {
        h.field = h.field.trim().to_string();
        h.value = h.value.trim().to_string();
    }
    d
}
