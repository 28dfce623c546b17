//! Google Gemini provider implementation

use crate::client::{LLMRequest, LLMResponse, ProviderAdapter};
use crate::error::{LLMError, Result};
use crate::provider::{http_client, parse_success, require_key, ProviderKind, DEFAULT_TIMEOUT};
use crate::retry::{send_with_backoff, RetryPolicy};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Google Gemini provider (query-string key, parts arrays).
///
/// The public tier throttles aggressively, so 429 responses are retried
/// according to the adapter's [`RetryPolicy`].
pub struct GeminiProvider {
    api_key: Option<String>,
    base_url: String,
    model: String,
    retry: RetryPolicy,
    client: Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
            client: http_client(DEFAULT_TIMEOUT),
        }
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the throttling retry schedule
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    fn build_body(&self, request: &LLMRequest) -> serde_json::Value {
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": request.prompt}]
            }],
        });

        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({
                "parts": [{"text": system}]
            });
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(max_tokens) = request.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }
        if let Some(temperature) = request.temperature {
            generation_config.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = request.top_p {
            generation_config.insert("topP".to_string(), json!(top_p));
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = json!(generation_config);
        }
        body
    }
}

/// Concatenate `candidates[0].content.parts[].text` in order
fn extract_candidate_text(resp_json: &serde_json::Value) -> Result<String> {
    let parts = resp_json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| LLMError::InvalidResponse("No content in response".to_string()))?;

    Ok(parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect())
}

#[async_trait]
impl ProviderAdapter for GeminiProvider {
    async fn invoke(&self, request: LLMRequest) -> Result<LLMResponse> {
        let api_key = require_key(&self.api_key, self.kind())?;
        let started = Instant::now();
        let body = self.build_body(&request);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        debug!(model = %self.model, prompt_len = request.prompt.len(), "Calling Gemini");

        let exchange = send_with_backoff(&self.retry, || {
            self.client
                .post(&url)
                .query(&[("key", api_key)])
                .header("Content-Type", "application/json")
                .json(&body)
        })
        .await?;

        if exchange.attempts > 1 {
            warn!(
                attempts = exchange.attempts,
                status = exchange.status,
                "Gemini call needed retries"
            );
        }

        let resp_json = parse_success(exchange.status, exchange.body)?;
        let content = extract_candidate_text(&resp_json)?;

        let finish_reason = resp_json["candidates"][0]["finishReason"]
            .as_str()
            .unwrap_or("STOP")
            .to_string();
        let tokens_used = resp_json["usageMetadata"]["totalTokenCount"]
            .as_u64()
            .unwrap_or(0) as u32;

        Ok(LLMResponse::new(content, self.model.clone())
            .with_tokens(tokens_used)
            .with_finish_reason(finish_reason)
            .with_attempts(exchange.attempts, exchange.backoffs)
            .with_latency(started.elapsed()))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }
}
