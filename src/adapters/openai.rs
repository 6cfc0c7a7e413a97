//! Default adapters speaking the OpenAI-compatible HTTP surface.
//!
//! Extraction uses `POST {endpoint}/chat/completions` with the region image
//! attached as a base64 `data:` URI; illustration uses
//! `POST {endpoint}/images/generations` with a `b64_json` response. Both
//! shapes are accepted verbatim by OpenAI, Azure OpenAI deployments behind a
//! compatible gateway, and most self-hosted inference servers.
//!
//! Error mapping is the retry contract: 429 → [`AdapterError::RateLimited`],
//! 5xx and connection failures → [`AdapterError::Transient`], request
//! timeouts → [`AdapterError::Timeout`], 401/403 → [`AdapterError::Auth`],
//! and remaining 4xx → [`AdapterError::Rejected`]. The drivers in
//! [`crate::pipeline`] decide retries purely from these variants.

use crate::adapters::{
    AdapterError, ExtractionRequest, Illustrator, IllustrationRequest, RecipeExtractor,
};
use crate::error::CookbookError;
use crate::prompts;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::debug;

/// Shared HTTP plumbing for both adapters.
#[derive(Debug, Clone)]
struct HttpService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpService {
    fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, CookbookError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CookbookError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, AdapterError> {
        let start = Instant::now();
        let url = format!("{}/{}", self.endpoint, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    }
                } else {
                    AdapterError::Transient {
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(AdapterError::RateLimited { retry_after_secs });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AdapterError::Auth {
                detail: format!("HTTP {status}"),
            });
        }
        if status.is_server_error() {
            return Err(AdapterError::Transient {
                detail: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(AdapterError::Rejected { detail });
        }

        response.json().await.map_err(|e| AdapterError::Transient {
            detail: format!("response body: {e}"),
        })
    }
}

/// Extraction adapter: vision chat-completions call returning raw model text.
#[derive(Debug, Clone)]
pub struct OpenAiRecipeExtractor {
    http: HttpService,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl OpenAiRecipeExtractor {
    /// Create an extractor against an OpenAI-compatible endpoint.
    ///
    /// `endpoint` is the API base, e.g. `https://api.openai.com/v1`.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, CookbookError> {
        Ok(Self {
            http: HttpService::new(endpoint, api_key, timeout_secs)?,
            model: model.into(),
            system_prompt: prompts::DEFAULT_EXTRACTION_PROMPT.to_string(),
            temperature: 0.1,
            max_tokens: 2048,
        })
    }

    /// Override the built-in extraction system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[async_trait]
impl RecipeExtractor for OpenAiRecipeExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> Result<String, AdapterError> {
        let user_text = prompts::extraction_user_prompt(
            request.source_language.as_deref(),
            &request.target_language,
        );
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                {
                    "role": "system",
                    "content": self.system_prompt,
                },
                {
                    "role": "user",
                    "content": [
                        {"type": "text", "text": user_text},
                        {
                            "type": "image_url",
                            "image_url": {"url": request.image.to_data_uri()},
                        },
                    ],
                },
            ],
        });

        let response = self.http.post_json("chat/completions", &body).await?;
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AdapterError::Transient {
                detail: "response missing choices[0].message.content".into(),
            })?;
        debug!("Extraction response: {} bytes", content.len());
        Ok(content.to_string())
    }
}

/// Illustration adapter: image-generations call returning decoded PNG bytes.
#[derive(Debug, Clone)]
pub struct OpenAiIllustrator {
    http: HttpService,
    model: String,
    size: String,
}

impl OpenAiIllustrator {
    /// Create an illustrator against an OpenAI-compatible endpoint.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, CookbookError> {
        Ok(Self {
            http: HttpService::new(endpoint, api_key, timeout_secs)?,
            model: model.into(),
            size: "1024x1024".to_string(),
        })
    }

    /// Override the generated image size (e.g. `"512x512"`).
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }
}

#[async_trait]
impl Illustrator for OpenAiIllustrator {
    async fn illustrate(&self, request: &IllustrationRequest) -> Result<Vec<u8>, AdapterError> {
        let body = json!({
            "model": self.model,
            "prompt": request.prompt,
            "size": self.size,
            "n": 1,
            "response_format": "b64_json",
        });

        let response = self.http.post_json("images/generations", &body).await?;
        let b64 = response["data"][0]["b64_json"]
            .as_str()
            .ok_or_else(|| AdapterError::Transient {
                detail: "response missing data[0].b64_json".into(),
            })?;
        let bytes = STANDARD.decode(b64).map_err(|e| AdapterError::Transient {
            detail: format!("invalid base64 in response: {e}"),
        })?;
        debug!("Illustration response: {} bytes", bytes.len());
        Ok(bytes)
    }
}
