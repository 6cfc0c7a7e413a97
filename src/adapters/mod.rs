//! Trait seams for the external extraction and illustration services.
//!
//! The pipeline treats both services as opaque collaborators with a
//! request/response contract. Keeping them behind object-safe traits means
//! retry behaviour, validation, and orchestration are all testable with mock
//! implementations — no network, no API keys.
//!
//! [`openai`] provides default implementations speaking the OpenAI-compatible
//! HTTP surface (chat completions with an image attachment; image
//! generations), which covers OpenAI, Azure OpenAI deployments, and the many
//! self-hosted gateways that mimic them.

pub mod openai;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// An error from an extraction or illustration call.
///
/// The split into transient and permanent variants is what drives the retry
/// predicate: [`RetryPolicy::should_retry`] retries only variants where a
/// second attempt can plausibly succeed without changing the request.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network failure or 5xx — the service may recover.
    #[error("transient service error: {detail}")]
    Transient { detail: String },

    /// HTTP 429 — back off before the next attempt.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// The call exceeded the configured timeout.
    #[error("service call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Authentication failure (401/403) — retry will not help.
    #[error("authentication error: {detail}")]
    Auth { detail: String },

    /// The service rejected the request itself (400) — retry will not help.
    #[error("request rejected: {detail}")]
    Rejected { detail: String },
}

impl AdapterError {
    /// Whether a retry with the same request can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterError::Transient { .. }
                | AdapterError::RateLimited { .. }
                | AdapterError::Timeout { .. }
        )
    }
}

/// A base64-encoded image payload for a multimodal request body.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Base64 image data (no `data:` prefix).
    pub data: String,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
}

impl EncodedImage {
    /// Render as a `data:` URI as embedded in OpenAI-style payloads.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Request for structured recipe extraction from one photo region.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// The normalized region image.
    pub image: EncodedImage,
    /// Optional hint for the language the photographed recipe is written in.
    pub source_language: Option<String>,
    /// Language the structured record should be produced in.
    pub target_language: String,
}

/// Request for one style-consistent illustration.
#[derive(Debug, Clone)]
pub struct IllustrationRequest {
    /// Full generation prompt (recipe summary + style descriptor), built by
    /// [`crate::prompts::illustration_prompt`].
    pub prompt: String,
    /// Optional source photo as a visual reference, when the service
    /// supports image conditioning.
    pub reference_image: Option<EncodedImage>,
}

/// The structured-extraction collaborator.
///
/// Implementations return the *raw* model output; schema validation is the
/// pipeline's job (the core rejects, it does not coerce).
#[async_trait]
pub trait RecipeExtractor: Send + Sync {
    /// Submit one region image and return the raw model response text.
    async fn extract(&self, request: &ExtractionRequest) -> Result<String, AdapterError>;
}

/// The image-generation collaborator.
#[async_trait]
pub trait Illustrator: Send + Sync {
    /// Generate one illustration and return the raw image bytes.
    async fn illustrate(&self, request: &IllustrationRequest) -> Result<Vec<u8>, AdapterError>;
}

/// An explicit retry policy value, passed into the extract/illustrate drivers.
///
/// Replacing ad hoc retry loops with a value makes retry behaviour testable
/// without network mocking: `max_attempts`, the backoff schedule, and the
/// retryable-error predicate all live here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retry attempts after the first try. 0 disables retries entirely.
    pub max_retries: u32,
    /// Initial backoff delay; doubles after each attempt.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry `attempt` (1-indexed): `backoff_ms × 2^(attempt−1)`.
    ///
    /// With the 500 ms default and 3 retries the wait sequence is
    /// 500 ms → 1 s → 2 s, totalling under 4 s of back-off per unit.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(1u64 << exp))
    }

    /// The retryable-error predicate: transient errors only, and only while
    /// attempts remain.
    pub fn should_retry(&self, error: &AdapterError, attempts_used: u32) -> bool {
        error.is_transient() && attempts_used <= self.max_retries
    }
}
