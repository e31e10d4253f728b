//! Classification: send the document to Gemini and get descriptors back.
//!
//! This module builds the `generateContent` request (system instruction,
//! strict response schema, inline base64 document), performs the call with a
//! bounded timeout and returns parsed [`DocumentDescriptor`]s. Prompt text
//! lives in [`crate::prompts`]; text cleanup lives in
//! [`crate::pipeline::parse`].
//!
//! ## Retry Strategy
//!
//! Only transient failures are retried (see
//! [`DocSplitError::is_transient`]): timeouts, connection failures and HTTP
//! 429/500/502/503/504. The wait is `retry_backoff_ms * 2^(attempt-1)` plus up
//! to 50 % random jitter, so with the defaults (500 ms, 2 retries) a failing
//! request gives up after roughly 1.5–2.3 s of back-off. A successful
//! response is returned exactly as with a single attempt.

use crate::config::ProcessConfig;
use crate::error::DocSplitError;
use crate::output::DocumentDescriptor;
use crate::pipeline::encode::{encode_document, InlineData};
use crate::pipeline::parse;
use crate::prompts::{response_schema, DEFAULT_SYSTEM_PROMPT, USER_INSTRUCTION};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Anything that can turn a document into descriptors.
///
/// [`GeminiClassifier`] is the production implementation. Inject another one
/// through [`crate::config::ProcessConfigBuilder::classifier`].
#[async_trait]
pub trait DocumentClassifier: Send + Sync {
    /// Classify every sub-document in `document`.
    ///
    /// Returns descriptors in the order the model listed them. An empty
    /// vector means the model found nothing; the caller decides whether
    /// that is an error.
    async fn classify(
        &self,
        document: &[u8],
        mime_type: &str,
    ) -> Result<Vec<DocumentDescriptor>, DocSplitError>;

    /// Short provider name used in logs.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Gemini `generateContent` client.
pub struct GeminiClassifier {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    system_prompt: String,
    max_output_tokens: u32,
    temperature: Option<f32>,
    timeout_secs: u64,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl std::fmt::Debug for GeminiClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClassifier")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl GeminiClassifier {
    /// Build a client from the config.
    ///
    /// Fails fast with [`DocSplitError::ProviderNotConfigured`] when no API
    /// key is configured or present in `GEMINI_API_KEY`.
    pub fn from_config(config: &ProcessConfig) -> Result<Self, DocSplitError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| DocSplitError::ProviderNotConfigured {
                provider: "gemini".to_string(),
                hint: format!(
                    "{} environment variable is required",
                    crate::config::API_KEY_ENV
                ),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| DocSplitError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            url: format!(
                "{}/models/{}:generateContent",
                config.endpoint, config.model
            ),
            model: config.model.clone(),
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            timeout_secs: config.api_timeout_secs,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    /// The full `generateContent` URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Assemble the request body for an already-encoded document.
    pub fn build_request(&self, document: InlineData) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(&self.system_prompt)],
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema(),
                max_output_tokens: self.max_output_tokens,
                temperature: self.temperature,
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(USER_INSTRUCTION), Part::inline(document)],
            }],
        }
    }

    /// One HTTP round-trip, no retries.
    async fn attempt(
        &self,
        body: &GenerateContentRequest,
    ) -> Result<Vec<DocumentDescriptor>, DocSplitError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(DocSplitError::UpstreamStatus {
                status: status.as_u16(),
                body: truncate(&text, 2000),
            });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                DocSplitError::ApiTimeout {
                    secs: self.timeout_secs,
                }
            } else {
                DocSplitError::MalformedResponse {
                    detail: format!("response body is not valid JSON: {e}"),
                }
            }
        })?;

        let text = extract_text(parsed)?;
        parse::parse_documents(&text)
    }

    fn transport_error(&self, e: reqwest::Error) -> DocSplitError {
        if e.is_timeout() {
            DocSplitError::ApiTimeout {
                secs: self.timeout_secs,
            }
        } else {
            DocSplitError::UpstreamUnavailable {
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl DocumentClassifier for GeminiClassifier {
    async fn classify(
        &self,
        document: &[u8],
        mime_type: &str,
    ) -> Result<Vec<DocumentDescriptor>, DocSplitError> {
        let start = Instant::now();
        let body = self.build_request(encode_document(document, mime_type));
        info!(
            "Classifying {} bytes with {} ({})",
            document.len(),
            self.model,
            mime_type
        );

        let mut attempt = 0u32;
        loop {
            match self.attempt(&body).await {
                Ok(documents) => {
                    debug!(
                        "Classifier returned {} documents in {:?} after {} retries",
                        documents.len(),
                        start.elapsed(),
                        attempt
                    );
                    return Ok(documents);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.retry_backoff_ms, attempt);
                    warn!(
                        "Classification attempt failed: {}; retry {}/{} in {}ms",
                        e,
                        attempt,
                        self.max_retries,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Exponential back-off with up to 50 % jitter. `attempt` is 1-based.
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let jitter = if exp >= 2 {
        rand::thread_rng().gen_range(0..=exp / 2)
    } else {
        0
    };
    Duration::from_millis(exp.saturating_add(jitter))
}

/// Pull the concatenated text of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, DocSplitError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!(" (blocked: {r})"))
            .unwrap_or_default();
        return Err(DocSplitError::MalformedResponse {
            detail: format!("no candidates in response{reason}"),
        });
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(DocSplitError::MalformedResponse {
            detail: format!(
                "candidate has no text (finishReason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        });
    }
    Ok(text)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

/// `generateContent` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub generation_config: GenerationConfig,
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: serde_json::Value,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

/// Either a text part or an inline document part.
#[derive(Debug, Clone, Serialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    fn text(s: &str) -> Self {
        Self {
            text: Some(s.to_string()),
            inline_data: None,
        }
    }

    fn inline(data: InlineData) -> Self {
        Self {
            text: None,
            inline_data: Some(data),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::PDF_MIME;

    fn classifier() -> GeminiClassifier {
        let config = ProcessConfig::builder()
            .api_key("test-key")
            .endpoint("http://127.0.0.1:1/v1beta")
            .build()
            .unwrap();
        GeminiClassifier::from_config(&config).unwrap()
    }

    #[test]
    fn missing_key_fails_fast() {
        let config = ProcessConfig::builder().api_key("  ").build().unwrap();
        let err = GeminiClassifier::from_config(&config).unwrap_err();
        assert!(matches!(err, DocSplitError::ProviderNotConfigured { .. }));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn url_includes_model() {
        assert_eq!(
            classifier().url(),
            "http://127.0.0.1:1/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
    }

    #[test]
    fn request_shape() {
        let body = classifier().build_request(encode_document(b"%PDF", PDF_MIME));
        let json = serde_json::to_value(&body).unwrap();

        assert!(json["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("mortgage document pack classifier"));
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 10_000);
        assert!(json["generationConfig"].get("temperature").is_none());
        assert_eq!(
            json["generationConfig"]["responseSchema"]["required"][0],
            "documents"
        );
        assert_eq!(json["contents"][0]["role"], "user");
        assert!(json["contents"][0]["parts"][0]["text"].is_string());
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "application/pdf"
        );
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["data"],
            "JVBERg=="
        );
    }

    #[test]
    fn extract_text_joins_parts() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"documents\":"},{"text":"[]}"}]},
               "finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(resp).unwrap(), r#"{"documents":[]}"#);
    }

    #[test]
    fn extract_text_reports_block_reason() {
        let resp: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        let err = extract_text(resp).unwrap_err();
        assert!(err.to_string().contains("SAFETY"), "got: {err}");
    }

    #[test]
    fn extract_text_reports_finish_reason() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"MAX_TOKENS"}]}"#,
        )
        .unwrap();
        let err = extract_text(resp).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"), "got: {err}");
    }

    #[test]
    fn backoff_grows_with_bounded_jitter() {
        for attempt in 1..=3u32 {
            let base = 100 * (1u64 << (attempt - 1));
            let d = backoff_delay(100, attempt).as_millis() as u64;
            assert!(d >= base && d <= base + base / 2, "attempt {attempt}: {d}ms");
        }
        assert_eq!(backoff_delay(0, 1), Duration::ZERO);
    }

    #[test]
    fn truncate_long_bodies() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
