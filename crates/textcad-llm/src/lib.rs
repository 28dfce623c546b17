//! textcad LLM dispatch
//!
//! Turns a natural-language design request into OpenSCAD source by calling
//! exactly one of several hosted LLM backends:
//! - Provider adapters: OpenAI, Anthropic, Together (DeepSeek) and Gemini
//! - Sanitizing of raw model output into renderer-ready source
//! - An optional retrieval gate that consults a knowledge index first
//! - Bulk CAD-THOUGHTS corpus generation under a rate limit
//!
//! Rendering and file persistence live in `textcad-server`.

// Re-export core types
pub use client::{LLMRequest, LLMResponse, ProviderAdapter};
pub use design::{DesignRequest, GenerationResult};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{LLMError, Result};
pub use sanitizer::{sanitize, Sanitizer};

// Re-export providers
pub use provider::{
    AnthropicProvider, GeminiProvider, MockProvider, OpenAIProvider, ProviderKind,
    TogetherProvider, DEEPSEEK_R1,
};

pub use batch::{BatchOptions, BatchRecord, BatchRunner};
pub use rate_limiter::RateLimiter;
pub use retrieval::{HttpKnowledgeIndex, KnowledgeIndex, RetrievalGate, RetrievalOutcome};
pub use retry::RetryPolicy;

pub mod batch;
pub mod client;
pub mod design;
pub mod dispatcher;
pub mod error;
pub mod prompt_templates;
pub mod provider;
pub mod rate_limiter;
pub mod retrieval;
pub mod retry;
pub mod sanitizer;
