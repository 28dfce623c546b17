//! Retrieval augmentation gate
//!
//! Asks a knowledge index first and falls through to the [`Dispatcher`]
//! when the index has nothing or cannot be reached. Retrieval problems never
//! surface to the caller; only dispatcher errors do.

use crate::design::{DesignRequest, GenerationResult};
use crate::dispatcher::Dispatcher;
use crate::error::{LLMError, Result};
use crate::provider::{http_client, parse_success, send_raw, DEFAULT_TIMEOUT};
use crate::sanitizer::Sanitizer;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Label used when the index answered
pub const RAG_LABEL: &str = "RAG";

/// Read-only knowledge index
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// Query the index; an empty string means "nothing relevant"
    async fn query(&self, prompt: &str) -> Result<String>;
}

/// Knowledge index reached over HTTP.
///
/// Posts `{"query": prompt}` to `{base_url}/query` and reads the
/// `response` field of the answer.
pub struct HttpKnowledgeIndex {
    base_url: String,
    client: Client,
}

impl HttpKnowledgeIndex {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client(timeout),
        }
    }
}

#[async_trait]
impl KnowledgeIndex for HttpKnowledgeIndex {
    async fn query(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/query", self.base_url);
        let (status, body) = send_raw(self.client.post(&url).json(&json!({ "query": prompt }))).await?;
        let value = parse_success(status, body)?;

        match &value["response"] {
            serde_json::Value::String(text) => Ok(text.clone()),
            serde_json::Value::Null => Ok(String::new()),
            other => Err(LLMError::InvalidResponse(format!(
                "index response is not a string: {}",
                other
            ))),
        }
    }
}

/// What the index had to say about a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// Non-empty answer text
    Answer(String),
    /// The index answered with nothing
    Empty,
    /// The index could not be queried
    Unavailable(String),
}

/// Optional retrieval step in front of the dispatcher
pub struct RetrievalGate {
    index: Arc<dyn KnowledgeIndex>,
    dispatcher: Arc<Dispatcher>,
    sanitizer: Sanitizer,
}

impl RetrievalGate {
    pub fn new(index: Arc<dyn KnowledgeIndex>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            index,
            dispatcher,
            sanitizer: Sanitizer::default(),
        }
    }

    /// Query the index and classify the result
    pub async fn lookup(&self, prompt: &str) -> RetrievalOutcome {
        match self.index.query(prompt).await {
            Ok(text) if text.trim().is_empty() => RetrievalOutcome::Empty,
            Ok(text) => RetrievalOutcome::Answer(text),
            Err(e) => RetrievalOutcome::Unavailable(e.to_string()),
        }
    }

    /// Answer from the index, or from the dispatcher with a fallback label
    pub async fn answer(
        &self,
        request: &DesignRequest,
        selector: Option<&str>,
    ) -> Result<GenerationResult> {
        let suffix = match self.lookup(request.as_str()).await {
            RetrievalOutcome::Answer(text) => {
                let source = self.sanitizer.sanitize(&text);
                if !source.is_empty() {
                    info!("Answered from knowledge index");
                    return Ok(GenerationResult::new(source, RAG_LABEL.to_string()));
                }
                warn!("Index answer was empty after cleanup, falling back");
                "RAG fallback"
            }
            RetrievalOutcome::Empty => {
                warn!("Knowledge index returned nothing, falling back");
                "RAG fallback"
            }
            RetrievalOutcome::Unavailable(reason) => {
                warn!(reason = %reason, "Knowledge index unavailable, falling back");
                "RAG error fallback"
            }
        };

        let result = self.dispatcher.generate(request, selector).await?;
        let label = format!("{} ({})", result.attribution_label(), suffix);
        Ok(result.relabel(label))
    }
}
