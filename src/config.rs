//! Configuration types for a cookbook run.
//!
//! All run behaviour is controlled through [`RunConfig`], built via its
//! [`RunConfigBuilder`]. Keeping every knob in one struct makes it trivial to
//! share configs across tasks, log them, and diff two runs to understand why
//! their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::adapters::{Illustrator, RecipeExtractor, RetryPolicy};
use crate::error::CookbookError;
use crate::markdown::OutputWriter;
use crate::progress::RunProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run-level cancellation signal.
///
/// Cancelling stops the orchestrator from scheduling new units; units already
/// in flight complete (or time out) normally, and unscheduled units are
/// reported as incomplete in their last successful state rather than
/// discarded. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Configuration for one photos-to-cookbook run.
///
/// Built via [`RunConfig::builder()`] or [`RunConfig::default()`].
///
/// # Example
/// ```rust
/// use photos2cookbook::RunConfig;
///
/// let config = RunConfig::builder()
///     .target_aspect_ratio(0.8)
///     .split_margin_ratio(0.08)
///     .target_language("English")
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Target width/height ratio for normalized photos. Default: 0.8 (4:5).
    ///
    /// Portrait 4:5 fits a recipe card or cookbook page snugly and is the
    /// shape the downstream page layout expects.
    pub target_aspect_ratio: f32,

    /// Minimum seam width for composite splitting, as a fraction of the
    /// shorter image dimension. Range: (0, 1). Default: 0.08.
    ///
    /// Contact-sheet gutters are typically 5–15 % of the frame; 8 % accepts
    /// real gutters while ignoring thin rules and shadows.
    pub split_margin_ratio: f32,

    /// Language the photographed recipes are written in, when known.
    /// `None` lets the extraction model detect it.
    pub source_language: Option<String>,

    /// Language for the extracted records and output documents.
    /// Default: "English".
    pub target_language: String,

    /// Directory of reference style images for the illustration look.
    pub reference_style_dir: Option<PathBuf>,

    /// Fallback style phrase used when no reference images are available.
    /// With neither set, the run aborts with `EmptyStyleSet`.
    pub default_style: Option<String>,

    /// Base directory for the generated cookbook. Default: `cookbook`.
    pub output_dir: PathBuf,

    /// Number of concurrent extract/illustrate units. Default: 4.
    ///
    /// Both external services are network-bound; a small pool hides latency
    /// without tripping rate limits. Lower this if you see 429 responses.
    pub concurrency: usize,

    /// Retry policy for extraction and illustration calls.
    /// Default: 3 retries, 500 ms initial backoff, doubling per attempt.
    pub retry: RetryPolicy,

    /// Per-service-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// OpenAI-compatible API base for the default adapters,
    /// e.g. `https://api.openai.com/v1`. Falls back to the standard OpenAI
    /// endpoint when only an API key is available.
    pub api_endpoint: Option<String>,

    /// API key for the default adapters. Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,

    /// Extraction model identifier. Default: `gpt-4o-mini`.
    pub extraction_model: Option<String>,

    /// Illustration model identifier. Default: `gpt-image-1`.
    pub illustration_model: Option<String>,

    /// Custom extraction system prompt. If `None`, uses the built-in default.
    pub extraction_prompt: Option<String>,

    /// Pass the normalized region photo to the illustrator as a visual
    /// reference. Default: true.
    pub photo_as_reference: bool,

    /// Pre-constructed extraction adapter. Takes precedence over the
    /// endpoint/key/model settings.
    pub extractor: Option<Arc<dyn RecipeExtractor>>,

    /// Pre-constructed illustration adapter. Takes precedence over the
    /// endpoint/key/model settings.
    pub illustrator: Option<Arc<dyn Illustrator>>,

    /// Custom output writer. Defaults to the Markdown writer rooted at
    /// `output_dir`.
    pub writer: Option<Arc<dyn OutputWriter>>,

    /// Progress callback for per-unit events.
    pub progress_callback: Option<Arc<dyn RunProgressCallback>>,

    /// Cooperative cancellation signal for this run.
    pub cancel: CancelSignal,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_aspect_ratio: 0.8,
            split_margin_ratio: 0.08,
            source_language: None,
            target_language: "English".to_string(),
            reference_style_dir: None,
            default_style: None,
            output_dir: PathBuf::from("cookbook"),
            concurrency: 4,
            retry: RetryPolicy::default(),
            api_timeout_secs: 60,
            api_endpoint: None,
            api_key: None,
            extraction_model: None,
            illustration_model: None,
            extraction_prompt: None,
            photo_as_reference: true,
            extractor: None,
            illustrator: None,
            writer: None,
            progress_callback: None,
            cancel: CancelSignal::new(),
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("target_aspect_ratio", &self.target_aspect_ratio)
            .field("split_margin_ratio", &self.split_margin_ratio)
            .field("source_language", &self.source_language)
            .field("target_language", &self.target_language)
            .field("reference_style_dir", &self.reference_style_dir)
            .field("default_style", &self.default_style)
            .field("output_dir", &self.output_dir)
            .field("concurrency", &self.concurrency)
            .field("retry", &self.retry)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("extraction_model", &self.extraction_model)
            .field("illustration_model", &self.illustration_model)
            .field("photo_as_reference", &self.photo_as_reference)
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn RecipeExtractor>"))
            .field("illustrator", &self.illustrator.as_ref().map(|_| "<dyn Illustrator>"))
            .field("writer", &self.writer.as_ref().map(|_| "<dyn OutputWriter>"))
            .finish()
    }
}

impl RunConfig {
    /// Create a new builder for `RunConfig`.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn target_aspect_ratio(mut self, ratio: f32) -> Self {
        self.config.target_aspect_ratio = ratio;
        self
    }

    pub fn split_margin_ratio(mut self, ratio: f32) -> Self {
        self.config.split_margin_ratio = ratio;
        self
    }

    pub fn source_language(mut self, lang: impl Into<String>) -> Self {
        self.config.source_language = Some(lang.into());
        self
    }

    pub fn target_language(mut self, lang: impl Into<String>) -> Self {
        self.config.target_language = lang.into();
        self
    }

    pub fn reference_style_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.reference_style_dir = Some(dir.into());
        self
    }

    pub fn default_style(mut self, style: impl Into<String>) -> Self {
        self.config.default_style = Some(style.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry.backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.api_endpoint = Some(endpoint.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn extraction_model(mut self, model: impl Into<String>) -> Self {
        self.config.extraction_model = Some(model.into());
        self
    }

    pub fn illustration_model(mut self, model: impl Into<String>) -> Self {
        self.config.illustration_model = Some(model.into());
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn photo_as_reference(mut self, v: bool) -> Self {
        self.config.photo_as_reference = v;
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn RecipeExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn illustrator(mut self, illustrator: Arc<dyn Illustrator>) -> Self {
        self.config.illustrator = Some(illustrator);
        self
    }

    pub fn writer(mut self, writer: Arc<dyn OutputWriter>) -> Self {
        self.config.writer = Some(writer);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn RunProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel(mut self, signal: CancelSignal) -> Self {
        self.config.cancel = signal;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RunConfig, CookbookError> {
        let c = &self.config;
        if !(c.target_aspect_ratio.is_finite() && c.target_aspect_ratio > 0.0) {
            return Err(CookbookError::InvalidConfig(format!(
                "target aspect ratio must be a positive number, got {}",
                c.target_aspect_ratio
            )));
        }
        if !(c.split_margin_ratio > 0.0 && c.split_margin_ratio < 1.0) {
            return Err(CookbookError::InvalidConfig(format!(
                "split margin ratio must be in (0, 1), got {}",
                c.split_margin_ratio
            )));
        }
        if c.target_language.trim().is_empty() {
            return Err(CookbookError::InvalidConfig(
                "target language must not be empty".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(CookbookError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::builder().build().unwrap();
        assert_eq!(config.target_aspect_ratio, 0.8);
        assert_eq!(config.split_margin_ratio, 0.08);
        assert_eq!(config.target_language, "English");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn zero_aspect_ratio_rejected() {
        let err = RunConfig::builder().target_aspect_ratio(0.0).build();
        assert!(matches!(err, Err(CookbookError::InvalidConfig(_))));
    }

    #[test]
    fn margin_ratio_bounds_enforced() {
        assert!(RunConfig::builder().split_margin_ratio(0.0).build().is_err());
        assert!(RunConfig::builder().split_margin_ratio(1.0).build().is_err());
        assert!(RunConfig::builder().split_margin_ratio(0.5).build().is_ok());
    }

    #[test]
    fn concurrency_clamped_to_one() {
        let config = RunConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn blank_target_language_rejected() {
        assert!(RunConfig::builder().target_language("  ").build().is_err());
    }

    #[test]
    fn cancel_signal_is_shared_between_clones() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_cancelled());
        signal.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn debug_omits_dyn_internals() {
        let config = RunConfig::default();
        let s = format!("{config:?}");
        assert!(s.contains("target_aspect_ratio"));
        assert!(s.contains("concurrency"));
    }
}
