//! Bulk CAD-THOUGHTS generation
//!
//! Fans a list of design prompts out to one provider under a concurrency
//! ceiling and a sliding-window rate limit. Each raw outcome is appended to a
//! JSONL partial log as soon as it completes, so an interrupted run keeps
//! everything finished so far.

use crate::client::{LLMRequest, ProviderAdapter};
use crate::error::{LLMError, Result};
use crate::prompt_templates::CAD_THOUGHTS_SYSTEM_PROMPT;
use crate::rate_limiter::RateLimiter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Error text recorded when a response is not the expected JSON
pub const PARSE_FAILURE: &str = "Failed to parse JSON";

/// Sampling and scheduling options for a batch run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// Maximum in-flight calls, also the per-second admission ceiling
    pub concurrency: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            temperature: 0.6,
            top_p: 0.95,
            max_tokens: 12000,
        }
    }
}

/// One line of the partial log: the raw outcome of a single call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartialEntry {
    Response { prompt: String, response: String },
    Error { prompt: String, error: String },
}

/// Structured content expected from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadThought {
    pub code_scad: Option<String>,
    pub chain_of_thought: Option<Vec<String>>,
}

/// One element of the final output array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchRecord {
    /// Response did not parse; the raw text is kept
    Unparsed {
        prompt: String,
        error: String,
        raw_response: String,
    },
    /// The call itself failed
    Failed { prompt: String, error: String },
    Thought {
        prompt: String,
        code_scad: Option<String>,
        chain_of_thought: Option<Vec<String>>,
    },
}

impl BatchRecord {
    pub fn prompt(&self) -> &str {
        match self {
            BatchRecord::Unparsed { prompt, .. }
            | BatchRecord::Failed { prompt, .. }
            | BatchRecord::Thought { prompt, .. } => prompt,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchRecord::Thought { .. })
    }
}

impl From<PartialEntry> for BatchRecord {
    fn from(entry: PartialEntry) -> Self {
        match entry {
            PartialEntry::Error { prompt, error } => BatchRecord::Failed { prompt, error },
            PartialEntry::Response { prompt, response } => match parse_thought(&response) {
                Ok(thought) => BatchRecord::Thought {
                    prompt,
                    code_scad: thought.code_scad,
                    chain_of_thought: thought.chain_of_thought,
                },
                Err(e) => {
                    debug!(prompt = %prompt, "Unparsable response: {}", e);
                    BatchRecord::Unparsed {
                        prompt,
                        error: PARSE_FAILURE.to_string(),
                        raw_response: response,
                    }
                }
            },
        }
    }
}

/// Parse a model answer into a [`CadThought`].
///
/// A leading `<think>...</think>` block and a surrounding ```` ```json ````
/// fence are removed first.
pub fn parse_thought(raw: &str) -> Result<CadThought> {
    let body = strip_json_fence(strip_think_block(raw));
    serde_json::from_str(body).map_err(|e| LLMError::Parse(e.to_string()))
}

fn strip_think_block(raw: &str) -> &str {
    let trimmed = raw.trim_start();
    if trimmed.starts_with("<think>") {
        if let Some(end) = trimmed.find("</think>") {
            return &trimmed[end + "</think>".len()..];
        }
    }
    raw
}

fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Error text recorded in the partial log for a failed call
fn describe(err: &LLMError) -> String {
    match err {
        LLMError::Provider { status, body } => format!("HTTP {}: {}", status, body),
        other => other.to_string(),
    }
}

/// Drives a batch run against a single adapter
pub struct BatchRunner {
    adapter: Arc<dyn ProviderAdapter>,
    options: BatchOptions,
    limiter: Arc<RateLimiter>,
}

impl BatchRunner {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, options: BatchOptions) -> Self {
        let limiter = Arc::new(RateLimiter::new(options.concurrency));
        Self {
            adapter,
            options,
            limiter,
        }
    }

    /// Replace the default one-second limiter
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Arc::new(limiter);
        self
    }

    /// Run the batch, appending raw outcomes to `partial_path`
    pub async fn run(&self, prompts: Vec<String>, partial_path: &Path) -> Result<Vec<BatchRecord>> {
        self.run_with_progress(prompts, partial_path, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_record` once per finished item
    pub async fn run_with_progress<F>(
        &self,
        prompts: Vec<String>,
        partial_path: &Path,
        mut on_record: F,
    ) -> Result<Vec<BatchRecord>>
    where
        F: FnMut(&BatchRecord),
    {
        let mut partial = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(partial_path)
            .await?;

        info!(
            items = prompts.len(),
            concurrency = self.options.concurrency,
            model = self.adapter.model(),
            "Starting batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut in_flight = HashMap::new();

        for prompt in prompts {
            let semaphore = semaphore.clone();
            let limiter = self.limiter.clone();
            let adapter = self.adapter.clone();
            let request = LLMRequest::new(prompt.clone())
                .with_system(CAD_THOUGHTS_SYSTEM_PROMPT)
                .with_temperature(self.options.temperature)
                .with_top_p(self.options.top_p)
                .with_max_tokens(self.options.max_tokens);

            let item = prompt.clone();
            let handle = tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return PartialEntry::Error {
                            prompt,
                            error: e.to_string(),
                        }
                    }
                };
                limiter.acquire().await;

                match adapter.invoke(request).await {
                    Ok(response) => PartialEntry::Response {
                        prompt,
                        response: response.content,
                    },
                    Err(e) => {
                        warn!(prompt = %prompt, "Batch item failed: {}", e);
                        PartialEntry::Error {
                            prompt,
                            error: describe(&e),
                        }
                    }
                }
            });
            in_flight.insert(handle.id(), item);
        }

        let mut records = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            let entry = match joined {
                Ok((id, entry)) => {
                    in_flight.remove(&id);
                    entry
                }
                Err(e) => {
                    error!("Batch task aborted: {}", e);
                    PartialEntry::Error {
                        prompt: in_flight.remove(&e.id()).unwrap_or_default(),
                        error: format!("task aborted: {}", e),
                    }
                }
            };

            let mut line = serde_json::to_string(&entry)?;
            line.push('\n');
            partial.write_all(line.as_bytes()).await?;
            partial.flush().await?;

            let record = BatchRecord::from(entry);
            on_record(&record);
            records.push(record);
        }

        let succeeded = records.iter().filter(|r| r.is_success()).count();
        info!(
            succeeded,
            failed = records.len() - succeeded,
            "Batch finished"
        );

        Ok(records)
    }
}

/// Read prompts from text: one per non-blank line, trimmed
pub fn read_prompts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
