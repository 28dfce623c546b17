//! Error types for textcad LLM dispatch

use thiserror::Error;

/// Result type alias for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// LLM module errors
#[derive(Debug, Error)]
pub enum LLMError {
    /// Missing credential or unusable provider setup. Raised before any network call.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Provider selector did not match any known backend
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Backend answered with a non-success status (after any retries)
    #[error("Provider error ({status}): {body}")]
    Provider {
        /// HTTP status code returned by the backend
        status: u16,
        /// Raw response body, kept for diagnosis
        body: String,
    },

    /// Network failure or client-side timeout
    #[error("Transport error: {0}")]
    Transport(String),

    /// Success status but the envelope did not carry the expected text
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// Design request was empty after trimming
    #[error("Empty prompt")]
    EmptyPrompt,

    /// Backend answered but nothing usable was left after sanitizing
    #[error("Failed to generate OpenSCAD code: {0}")]
    EmptyGeneration(String),

    /// Batch response was not the expected structured format
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LLMError {
    /// Whether the caller may reasonably retry the same request, possibly
    /// against a different provider.
    pub fn is_retryable(&self) -> bool {
        match self {
            LLMError::Provider { status, .. } => *status == 429 || *status >= 500,
            LLMError::Transport(_) | LLMError::EmptyGeneration(_) | LLMError::InvalidResponse(_) => {
                true
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LLMError::Transport(format!("request timed out: {}", err))
        } else {
            LLMError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = LLMError::Provider {
            status: 429,
            body: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "Provider error (429): quota exceeded");
    }

    #[test]
    fn test_empty_prompt_display() {
        assert_eq!(LLMError::EmptyPrompt.to_string(), "Empty prompt");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LLMError::Provider { status: 429, body: String::new() }.is_retryable());
        assert!(LLMError::Provider { status: 503, body: String::new() }.is_retryable());
        assert!(!LLMError::Provider { status: 401, body: String::new() }.is_retryable());
        assert!(LLMError::Transport("reset".to_string()).is_retryable());
        assert!(!LLMError::Configuration("no key".to_string()).is_retryable());
        assert!(!LLMError::UnsupportedProvider("foo".to_string()).is_retryable());
    }

    #[test]
    fn test_serde_error_conversion() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: LLMError = serde_err.into();
        assert!(err.to_string().starts_with("Serialization error"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LLMError>();
    }
}
