//! Illustration driver: one style-consistent artwork per extracted recipe.
//!
//! Shares the retry shape of [`crate::pipeline::extract`] — transient errors
//! back off exponentially up to the configured cap, permanent errors fail
//! fast — and consumes the run's shared [`StyleProfile`] read-only, so every
//! request in the run renders in the same style without rebuilding it.

use crate::adapters::{EncodedImage, Illustrator, IllustrationRequest};
use crate::config::RunConfig;
use crate::error::UnitError;
use crate::output::Illustration;
use crate::prompts;
use crate::recipe::RecipeRecord;
use crate::style::StyleProfile;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Generate the illustration for one extracted recipe.
///
/// `reference_image` optionally passes the normalized dish photo along as a
/// visual reference for services that support image conditioning.
pub async fn generate_illustration(
    illustrator: &Arc<dyn Illustrator>,
    photo_id: &str,
    region_index: usize,
    record: &RecipeRecord,
    style: &StyleProfile,
    reference_image: Option<EncodedImage>,
    config: &RunConfig,
) -> Result<Illustration, UnitError> {
    let request = IllustrationRequest {
        prompt: prompts::illustration_prompt(record, style),
        reference_image,
    };
    let policy = config.retry;
    let mut attempt = 0u32;

    loop {
        match illustrator.illustrate(&request).await {
            Ok(bytes) => {
                debug!(
                    "Photo '{}' region {}: illustration for '{}' ({} bytes)",
                    photo_id,
                    region_index,
                    record.dish_name,
                    bytes.len()
                );
                return Ok(Illustration {
                    bytes,
                    mime_type: "image/png".to_string(),
                });
            }
            Err(e) => {
                let next = attempt + 1;
                if policy.should_retry(&e, next) {
                    let backoff = policy.delay(next);
                    warn!(
                        "Photo '{}' region {}: illustration retry {}/{} after {:?} — {}",
                        photo_id, region_index, next, policy.max_retries, backoff, e
                    );
                    sleep(backoff).await;
                    attempt = next;
                    continue;
                }
                return Err(UnitError::IllustrationFailed {
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
    use crate::adapters::AdapterError;
    use crate::recipe::Ingredient;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn record() -> RecipeRecord {
        RecipeRecord {
            dish_name: "Toast".into(),
            description: String::new(),
            ingredients: vec![Ingredient {
                name: "bread".into(),
                quantity: String::new(),
                unit: String::new(),
            }],
            steps: vec!["Toast it.".into()],
            preparation_time: String::new(),
            cooking_time: String::new(),
            servings: String::new(),
            tips: vec![],
            source_language: None,
            target_language: "English".into(),
            source_photo: "p.jpg".into(),
        }
    }

    fn style() -> StyleProfile {
        StyleProfile {
            descriptor: "ink wash".into(),
            palette: vec![],
            reference_names: vec![],
        }
    }

    struct ScriptedIllustrator {
        responses: Mutex<VecDeque<Result<Vec<u8>, AdapterError>>>,
        calls: AtomicUsize,
        last_prompt: Mutex<String>,
    }

    impl ScriptedIllustrator {
        fn new(responses: Vec<Result<Vec<u8>, AdapterError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(String::new()),
            })
        }
    }

    #[async_trait]
    impl Illustrator for ScriptedIllustrator {
        async fn illustrate(&self, request: &IllustrationRequest) -> Result<Vec<u8>, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = request.prompt.clone();
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AdapterError::Transient { detail: "exhausted".into() }))
        }
    }

    fn fast_config() -> RunConfig {
        RunConfig::builder().retry_backoff_ms(1).build().unwrap()
    }

    #[tokio::test]
    async fn success_returns_bytes_and_uses_style_prompt() {
        let illustrator = ScriptedIllustrator::new(vec![Ok(vec![1, 2, 3])]);
        let dyn_illustrator: Arc<dyn Illustrator> = illustrator.clone();
        let out = generate_illustration(
            &dyn_illustrator,
            "p.jpg",
            0,
            &record(),
            &style(),
            None,
            &fast_config(),
        )
        .await
        .unwrap();
        assert_eq!(out.bytes, vec![1, 2, 3]);
        let prompt = illustrator.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("ink wash"));
        assert!(prompt.contains("Toast"));
    }

    #[tokio::test]
    async fn transient_then_success() {
        let illustrator = ScriptedIllustrator::new(vec![
            Err(AdapterError::Timeout { elapsed_ms: 100 }),
            Ok(vec![9]),
        ]);
        let dyn_illustrator: Arc<dyn Illustrator> = illustrator.clone();
        let out = generate_illustration(
            &dyn_illustrator,
            "p.jpg",
            0,
            &record(),
            &style(),
            None,
            &fast_config(),
        )
        .await
        .unwrap();
        assert_eq!(out.bytes, vec![9]);
        assert_eq!(illustrator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_record_failure() {
        let fails: Vec<Result<Vec<u8>, AdapterError>> = (0..10)
            .map(|_| Err(AdapterError::Transient { detail: "503".into() }))
            .collect();
        let illustrator = ScriptedIllustrator::new(fails);
        let dyn_illustrator: Arc<dyn Illustrator> = illustrator.clone();
        let config = RunConfig::builder()
            .max_retries(1)
            .retry_backoff_ms(1)
            .build()
            .unwrap();
        let err = generate_illustration(
            &dyn_illustrator,
            "p.jpg",
            2,
            &record(),
            &style(),
            None,
            &config,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            UnitError::IllustrationFailed { region: 2, retries: 1, .. }
        ));
        assert_eq!(illustrator.calls.load(Ordering::SeqCst), 2);
    }
}
