//! Provider adapter interface and request/response types

use crate::error::Result;
use crate::provider::ProviderKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request to an LLM backend
///
/// The adapter owns the model identifier; a request only carries the
/// conversation and sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    /// The user message (design instruction or raw batch prompt)
    pub prompt: String,

    /// System message/instructions
    pub system: Option<String>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Temperature for sampling
    pub temperature: Option<f32>,

    /// Nucleus sampling cutoff
    pub top_p: Option<f32>,
}

impl LLMRequest {
    /// Create a new LLM request
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
        }
    }

    /// Set system message
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set top_p
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }
}

/// Response from an LLM backend, already reduced to plain text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    /// The generated text (text-typed fragments only, in order)
    pub content: String,

    /// Model that generated the response
    pub model: String,

    /// Number of tokens used, when the backend reports it
    pub tokens_used: u32,

    /// Finish reason (e.g., "stop", "end_turn", "STOP")
    pub finish_reason: String,

    /// HTTP attempts made, including the successful one
    pub attempts: u32,

    /// Sleeps taken between attempts
    pub backoffs: Vec<Duration>,

    /// Wall time spent inside the adapter
    pub latency: Duration,
}

impl LLMResponse {
    /// Create a new LLM response
    pub fn new(content: String, model: String) -> Self {
        Self {
            content,
            model,
            tokens_used: 0,
            finish_reason: "stop".to_string(),
            attempts: 1,
            backoffs: Vec::new(),
            latency: Duration::ZERO,
        }
    }

    /// Set tokens used
    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens_used = tokens;
        self
    }

    /// Set finish reason
    pub fn with_finish_reason(mut self, reason: String) -> Self {
        self.finish_reason = reason;
        self
    }

    /// Record the retry history of the call
    pub fn with_attempts(mut self, attempts: u32, backoffs: Vec<Duration>) -> Self {
        self.attempts = attempts;
        self.backoffs = backoffs;
        self
    }

    /// Set latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// One backend's protocol: request construction, auth, and response parsing.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Send the request and return the extracted text.
    ///
    /// Fails with `LLMError::Configuration` before any network call when the
    /// adapter has no credential, and with `LLMError::Provider` on a
    /// non-success status.
    async fn invoke(&self, request: LLMRequest) -> Result<LLMResponse>;

    /// Which backend this adapter speaks to
    fn kind(&self) -> ProviderKind;

    /// Model identifier sent to the backend
    fn model(&self) -> &str;

    /// Short machine name of this adapter
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Human-readable provider/model label attached to results
    fn attribution(&self) -> String {
        format!("{} {}", self.kind().display_name(), self.model())
    }
}
