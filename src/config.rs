//! Configuration types for classifying and splitting PDF bundles.
//!
//! All behaviour is controlled through [`ProcessConfig`], built via its
//! [`ProcessConfigBuilder`]. One config is built at start-up and shared (it
//! is `Clone` and cheap to put behind an `Arc`) by every request; nothing in
//! the library reads global mutable state.

use crate::error::DocSplitError;
use crate::pipeline::classify::DocumentClassifier;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Default Gemini REST endpoint (without the `/models/...` suffix).
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Configuration for classifying and splitting a PDF.
///
/// Built via [`ProcessConfig::builder()`] or using
/// [`ProcessConfig::default()`].
///
/// # Example
/// ```rust
/// use docsplit::ProcessConfig;
///
/// let config = ProcessConfig::builder()
///     .model("gemini-2.0-flash")
///     .output_dir("/var/lib/docsplit/split")
///     .max_retries(0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ProcessConfig {
    /// Gemini API key. If None, read from `GEMINI_API_KEY` when the
    /// classifier is constructed.
    pub api_key: Option<String>,

    /// Gemini model identifier. Default: `gemini-2.0-flash-exp`.
    pub model: String,

    /// Base REST endpoint. Default: the public v1beta endpoint. Tests point
    /// this at a local server.
    pub endpoint: String,

    /// Maximum tokens the model may generate. Default: 10000.
    ///
    /// The response lists every sub-document with a multi-sentence summary
    /// and up to ten highlights; a 40-document pack stays well below this.
    pub max_output_tokens: u32,

    /// Sampling temperature. Default: None (provider default).
    pub temperature: Option<f32>,

    /// Per-attempt timeout for the classification call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Retry attempts on a transient classification failure. Default: 2.
    ///
    /// Only timeouts, connection failures and HTTP 429/500/502/503/504 are
    /// retried. `0` means a single attempt.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds. Default: 500.
    ///
    /// Doubles after each attempt; up to 50 % random jitter is added.
    pub retry_backoff_ms: u64,

    /// Custom system instruction. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Directory for transient uploads. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Directory for split artifacts. Default: `split_documents`.
    pub output_dir: PathBuf,

    /// Upper bound on an uploaded PDF in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Write each request's artifacts into its own `{batch_id}` subdirectory.
    /// Default: true.
    ///
    /// With `false`, artifacts land directly in `output_dir` and two
    /// concurrent requests producing the same `doc_type` at the same ordinal
    /// and range overwrite each other.
    pub isolate_batches: bool,

    /// URL path prefix used to build `download_url`. Default: `/download`.
    pub download_prefix: String,

    /// Pre-constructed classifier. Takes precedence over the Gemini settings.
    pub classifier: Option<Arc<dyn DocumentClassifier>>,

    /// Receives stage events while a document is processed.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_output_tokens: 10_000,
            temperature: None,
            api_timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 500,
            system_prompt: None,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("split_documents"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            isolate_batches: true,
            download_prefix: "/download".to_string(),
            classifier: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProcessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("temperature", &self.temperature)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("upload_dir", &self.upload_dir)
            .field("output_dir", &self.output_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("isolate_batches", &self.isolate_batches)
            .field("download_prefix", &self.download_prefix)
            .field(
                "classifier",
                &self.classifier.as_ref().map(|_| "<dyn DocumentClassifier>"),
            )
            .finish()
    }
}

impl ProcessConfig {
    /// Create a new builder for `ProcessConfig`.
    pub fn builder() -> ProcessConfigBuilder {
        ProcessConfigBuilder {
            config: Self::default(),
        }
    }

    /// Reopen a built config for further changes.
    pub fn into_builder(self) -> ProcessConfigBuilder {
        ProcessConfigBuilder { config: self }
    }

    /// The API key from the config, falling back to `GEMINI_API_KEY`.
    ///
    /// Blank values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    /// Upload limit rounded to whole MiB, for error messages.
    pub fn max_upload_mb(&self) -> usize {
        self.max_upload_bytes.div_ceil(1024 * 1024)
    }
}

/// Builder for [`ProcessConfig`].
pub struct ProcessConfigBuilder {
    config: ProcessConfig,
}

impl fmt::Debug for ProcessConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ProcessConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn isolate_batches(mut self, v: bool) -> Self {
        self.config.isolate_batches = v;
        self
    }

    pub fn download_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.download_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn DocumentClassifier>) -> Self {
        self.config.classifier = Some(classifier);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessConfig, DocSplitError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(DocSplitError::InvalidConfig("Model must not be empty".into()));
        }
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(DocSplitError::InvalidConfig(format!(
                "Endpoint must be an HTTP(S) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocSplitError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(DocSplitError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if !c.download_prefix.starts_with('/') {
            return Err(DocSplitError::InvalidConfig(format!(
                "Download prefix must start with '/', got '{}'",
                c.download_prefix
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ProcessConfig::default();
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.max_output_tokens, 10_000);
        assert_eq!(c.api_timeout_secs, 120);
        assert_eq!(c.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(c.max_upload_mb(), 50);
        assert!(c.isolate_batches);
    }

    #[test]
    fn builder_trims_trailing_slashes() {
        let c = ProcessConfig::builder()
            .endpoint("http://127.0.0.1:9000/v1beta/")
            .download_prefix("/files/")
            .build()
            .unwrap();
        assert_eq!(c.endpoint, "http://127.0.0.1:9000/v1beta");
        assert_eq!(c.download_prefix, "/files");
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(ProcessConfig::builder().model("  ").build().is_err());
        assert!(ProcessConfig::builder().endpoint("ftp://x").build().is_err());
        assert!(ProcessConfig::builder().api_timeout_secs(0).build().is_err());
        assert!(ProcessConfig::builder().max_upload_bytes(0).build().is_err());
        assert!(ProcessConfig::builder().download_prefix("dl").build().is_err());
    }

    #[test]
    fn explicit_key_is_trimmed() {
        let c = ProcessConfig::builder().api_key(" abc ").build().unwrap();
        assert_eq!(c.resolve_api_key().as_deref(), Some("abc"));
    }

    #[test]
    fn debug_redacts_key() {
        let c = ProcessConfig::builder().api_key("secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
