//! Extraction driver: turn one region image into a validated [`RecipeRecord`].
//!
//! This module owns the retry loop and the fail-closed gate; all prompt
//! content lives in [`crate::prompts`] and the HTTP mechanics in
//! [`crate::adapters`], so retry behaviour can change without touching either.
//!
//! ## Retry Strategy
//!
//! Transient failures (timeouts, 429/5xx) are frequent under concurrent
//! load. Exponential backoff (`backoff_ms × 2^(attempt−1)`) avoids the
//! thundering-herd problem where every worker retries at once. Validation
//! failures are **never** retried: a schema-violating answer from a
//! deterministic-enough model rarely improves without altering the prompt,
//! so the region is recorded as failed immediately.

use crate::adapters::{EncodedImage, ExtractionRequest, RecipeExtractor};
use crate::config::RunConfig;
use crate::error::UnitError;
use crate::recipe::{parse_recipe, RecipeRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Models sometimes wrap the JSON in fences despite the prompt saying not to.
static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*)\n```\s*$").unwrap());

/// Strip an outer ```json fence, if present, before parsing.
pub fn strip_json_fences(raw: &str) -> &str {
    match RE_OUTER_FENCES.captures(raw.trim()) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(raw),
        None => raw.trim(),
    }
}

/// Extract a recipe from one encoded region, with bounded retries.
///
/// Returns `Err(UnitError)` instead of propagating so one bad region never
/// aborts siblings; the orchestrator folds the error into the run report.
pub async fn extract_recipe(
    extractor: &Arc<dyn RecipeExtractor>,
    photo_id: &str,
    region_index: usize,
    image: EncodedImage,
    config: &RunConfig,
) -> Result<RecipeRecord, UnitError> {
    let request = ExtractionRequest {
        image,
        source_language: config.source_language.clone(),
        target_language: config.target_language.clone(),
    };
    let policy = config.retry;
    let mut attempt = 0u32;

    loop {
        match extractor.extract(&request).await {
            Ok(raw) => {
                let cleaned = strip_json_fences(&raw);
                return match parse_recipe(cleaned) {
                    Ok(mut record) => {
                        debug!(
                            "Photo '{}' region {}: extracted '{}'",
                            photo_id, region_index, record.dish_name
                        );
                        // Stamp provenance and languages; the model is not
                        // trusted to report them.
                        record.source_photo = photo_id.to_string();
                        record.target_language = config.target_language.clone();
                        if record.source_language.is_none() {
                            record.source_language = config.source_language.clone();
                        }
                        Ok(record)
                    }
                    Err(detail) => Err(UnitError::ExtractionValidation {
                        photo: photo_id.to_string(),
                        region: region_index,
                        detail,
                    }),
                };
            }
            Err(e) => {
                let next = attempt + 1;
                if policy.should_retry(&e, next) {
                    let backoff = policy.delay(next);
                    warn!(
                        "Photo '{}' region {}: retry {}/{} after {:?} — {}",
                        photo_id, region_index, next, policy.max_retries, backoff, e
                    );
                    sleep(backoff).await;
                    attempt = next;
                    continue;
                }
                return Err(UnitError::ExtractionFailed {
                    photo: photo_id.to_string(),
                    region: region_index,
                    retries: attempt,
                    detail: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterError, RetryPolicy};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn valid_json() -> String {
        r#"{
            "dish_name": "Toast",
            "ingredients": [{"name": "bread"}],
            "steps": ["Toast it."]
        }"#
        .to_string()
    }

    fn png_payload() -> EncodedImage {
        EncodedImage {
            data: "QUJD".into(),
            mime_type: "image/png".into(),
        }
    }

    fn fast_config() -> RunConfig {
        RunConfig::builder()
            .retry_backoff_ms(1)
            .target_language("English")
            .build()
            .unwrap()
    }

    /// Extractor that replays a scripted sequence of responses.
    struct ScriptedExtractor {
        responses: Mutex<VecDeque<Result<String, AdapterError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedExtractor {
        fn new(responses: Vec<Result<String, AdapterError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RecipeExtractor for ScriptedExtractor {
        async fn extract(&self, _request: &ExtractionRequest) -> Result<String, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AdapterError::Transient { detail: "exhausted".into() }))
        }
    }

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_json_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(strip_json_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn success_stamps_provenance() {
        let extractor = ScriptedExtractor::new(vec![Ok(valid_json())]);
        let dyn_extractor: Arc<dyn RecipeExtractor> = extractor.clone();
        let record = extract_recipe(&dyn_extractor, "card.jpg", 0, png_payload(), &fast_config())
            .await
            .unwrap();
        assert_eq!(record.source_photo, "card.jpg");
        assert_eq!(record.target_language, "English");
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fenced_response_still_parses() {
        let fenced = format!("```json\n{}\n```", valid_json());
        let extractor = ScriptedExtractor::new(vec![Ok(fenced)]);
        let dyn_extractor: Arc<dyn RecipeExtractor> = extractor;
        let record = extract_recipe(&dyn_extractor, "p", 0, png_payload(), &fast_config())
            .await
            .unwrap();
        assert_eq!(record.dish_name, "Toast");
    }

    #[tokio::test]
    async fn validation_failure_is_not_retried() {
        let extractor =
            ScriptedExtractor::new(vec![Ok(r#"{"dish_name": "Toast"}"#.to_string())]);
        let dyn_extractor: Arc<dyn RecipeExtractor> = extractor.clone();
        let err = extract_recipe(&dyn_extractor, "p", 1, png_payload(), &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, UnitError::ExtractionValidation { region: 1, .. }));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let extractor = ScriptedExtractor::new(vec![
            Err(AdapterError::Transient { detail: "503".into() }),
            Err(AdapterError::RateLimited { retry_after_secs: None }),
            Ok(valid_json()),
        ]);
        let dyn_extractor: Arc<dyn RecipeExtractor> = extractor.clone();
        let record = extract_recipe(&dyn_extractor, "p", 0, png_payload(), &fast_config())
            .await
            .unwrap();
        assert_eq!(record.dish_name, "Toast");
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_exhausted_records_failure() {
        let always_fail: Vec<Result<String, AdapterError>> = (0..10)
            .map(|_| Err(AdapterError::Transient { detail: "503".into() }))
            .collect();
        let extractor = ScriptedExtractor::new(always_fail);
        let dyn_extractor: Arc<dyn RecipeExtractor> = extractor.clone();
        let config = RunConfig::builder()
            .max_retries(2)
            .retry_backoff_ms(1)
            .build()
            .unwrap();
        let err = extract_recipe(&dyn_extractor, "p", 0, png_payload(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, UnitError::ExtractionFailed { retries: 2, .. }));
        // 1 initial call + 2 retries.
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_fails_fast() {
        let extractor = ScriptedExtractor::new(vec![Err(AdapterError::Auth {
            detail: "bad key".into(),
        })]);
        let dyn_extractor: Arc<dyn RecipeExtractor> = extractor.clone();
        let err = extract_recipe(&dyn_extractor, "p", 0, png_payload(), &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, UnitError::ExtractionFailed { retries: 0, .. }));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.backoff_ms, 500);
    }
}
