//! Instruction text and response schema sent to the classification model.
//!
//! Centralising every prompt here means changing the classifier's behaviour
//! (a new privacy rule, different highlight fields) touches exactly one
//! place, and tests can inspect the prompts without a network round-trip.
//!
//! Callers can override the system instruction via
//! [`crate::config::ProcessConfig::system_prompt`]; the user instruction and
//! the schema are fixed because the parser depends on them.

use serde_json::{json, Value};

/// Default system instruction for classifying a document pack.
///
/// Used when `ProcessConfig::system_prompt` is `None`.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a mortgage document pack classifier and summarizer. \
Return ONLY JSON that matches the schema. \
Infer doc_type yourself (no predefined list). \
Normalize doc_type to short snake_case (e.g., w2, paystub, bank_statement). \
Identify page ranges within the bundle (1-based inclusive). \
Provide a DETAILED, COMPREHENSIVE summary paragraph that includes: document type, time period covered, \
issuing entity, key financial figures, and significance for mortgage underwriting. \
Include a confidence score (0.0-1.0) for your classification. \
Follow privacy rules: mask SSNs and full account numbers (use last4); minimize PII; use ISO dates (YYYY-MM-DD). \
If a type is unclear, set doc_type='other' and explain thoroughly in summary.";

/// Fixed user-turn instruction sent alongside the document.
pub const USER_INSTRUCTION: &str = "Classify all sub-documents in this file and return only JSON per the schema. \
For images, set page_start=1 and page_end=1. \
Title should be a human-friendly heading found on the document. \
summary: write a DETAILED, INFORMATIVE paragraph (3-5 sentences) describing the document type, time period, \
issuing organization, key financial information, and its relevance to mortgage underwriting. \
Include specific details that would help an underwriter understand the document's significance. \
confidence: provide a decimal score 0.0-1.0 indicating your certainty in the classification. \
key_highlights: include 3-10 key fields as {field, value} pairs relevant to mortgage processing \
(examples if present: tax_year, employer, wages_box1, federal_withholding_box2; \
pay_period_start, gross_pay, net_pay; statement_period_start, ending_balance, account_last4; \
property_address, est_value_or_loan_amount, issue_or_closing_date). \
Use last4 for any identifiers; omit full SSNs and full account numbers.";

/// Fields every descriptor must carry, in schema order.
pub const REQUIRED_DESCRIPTOR_FIELDS: [&str; 7] = [
    "doc_type",
    "title",
    "page_start",
    "page_end",
    "confidence",
    "summary",
    "key_highlights",
];

/// Strict response schema forcing `{ "documents": [DocumentDescriptor, ...] }`.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "documents": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "doc_type": { "type": "string" },
                        "title": { "type": "string" },
                        "page_start": { "type": "integer", "minimum": 1 },
                        "page_end": { "type": "integer", "minimum": 1 },
                        "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
                        "summary": { "type": "string" },
                        "key_highlights": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "field": { "type": "string" },
                                    "value": { "type": "string" }
                                },
                                "required": ["field", "value"]
                            }
                        }
                    },
                    "required": REQUIRED_DESCRIPTOR_FIELDS
                }
            }
        },
        "required": ["documents"]
    })
}
