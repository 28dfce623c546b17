//! Mock LLM provider for testing

use crate::client::{LLMRequest, LLMResponse, ProviderAdapter};
use crate::error::{LLMError, Result};
use crate::provider::ProviderKind;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scripted outcome for one mock call
enum Scripted {
    Text(String),
    Status(u16, String),
}

/// Mock LLM provider for testing
///
/// Replays scripted responses in order, then falls back to the default
/// response. Every call is counted and its request recorded.
pub struct MockProvider {
    kind: ProviderKind,
    model: String,
    default_response: String,
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<LLMRequest>>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a new mock provider posing as OpenAI
    pub fn new() -> Self {
        Self::with_response("cube([10, 10, 10]);")
    }

    /// Create with custom default response
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::OpenAI,
            model: "mock-model".to_string(),
            default_response: response.into(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Pose as another backend
    pub fn as_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    /// Queue a text response for the next unscripted call
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(Scripted::Text(text.into()));
        self
    }

    /// Queue a provider failure for the next unscripted call
    pub fn then_status(self, status: u16, body: impl Into<String>) -> Self {
        self.push(Scripted::Status(status, body.into()));
        self
    }

    /// Number of `invoke` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in call order
    pub fn requests(&self) -> Vec<LLMRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, item: Scripted) {
        match self.script.lock() {
            Ok(mut script) => script.push_back(item),
            Err(poisoned) => poisoned.into_inner().push_back(item),
        }
    }

    fn next(&self) -> Option<Scripted> {
        match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn invoke(&self, request: LLMRequest) -> Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }

        match self.next() {
            Some(Scripted::Text(text)) => Ok(LLMResponse::new(text, self.model.clone())),
            Some(Scripted::Status(status, body)) => Err(LLMError::Provider { status, body }),
            None => Ok(LLMResponse::new(
                self.default_response.clone(),
                self.model.clone(),
            )
            .with_tokens(10)),
        }
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }
}
