//! Common types for model providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with a provider.
///
/// Every variant carries the provider name so a message read in a log or
/// shown to a user says which backend failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} returned HTTP {status}: {message}")]
    Status {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} did not answer within {}s", timeout.as_secs_f32())]
    Timeout { provider: String, timeout: Duration },

    #[error("{provider} request failed: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} returned an unrecognized response: {message}")]
    Schema { provider: String, message: String },

    #[error("{provider} returned a {actual}-dimensional embedding, expected {expected}")]
    Dimension {
        provider: String,
        expected: usize,
        actual: usize,
    },
}

impl ProviderError {
    pub fn schema(provider: &str, message: impl Into<String>) -> Self {
        Self::Schema {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Name of the provider that produced the error.
    pub fn provider(&self) -> &str {
        match self {
            Self::Status { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Schema { provider, .. }
            | Self::Dimension { provider, .. } => provider,
        }
    }

    /// HTTP status of the failed call, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transport failures and 5xx answers are worth one more attempt.
    /// Client errors, timeouts and malformed bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Transport { .. } => true,
            Self::Timeout { .. } | Self::Schema { .. } | Self::Dimension { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Provider trait for model backends.
///
/// Implementations provide chat completions and embeddings through
/// different remote APIs (OpenAI-compatible, Ollama).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short name used in errors and logs.
    fn name(&self) -> &str;

    /// Run a chat completion and return the whole answer.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Embed every input text, one vector per input, in input order.
    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse>;
}

/// Request for chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Completed chat answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    pub content: String,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub model: String,
    pub input: Vec<String>,
}

impl EmbedRequest {
    pub fn new(model: impl Into<String>, input: Vec<String>) -> Self {
        Self {
            model: model.into(),
            input,
        }
    }
}

/// Response containing embeddings, in the order of the request inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub model: String,
    pub embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let server = ProviderError::Status {
            provider: "openai".into(),
            status: 503,
            message: "busy".into(),
        };
        let client = ProviderError::Status {
            provider: "openai".into(),
            status: 401,
            message: "bad key".into(),
        };
        let timeout = ProviderError::Timeout {
            provider: "openai".into(),
            timeout: Duration::from_secs(30),
        };

        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!timeout.is_transient());
        assert_eq!(client.status(), Some(401));
        assert_eq!(timeout.status(), None);
        assert_eq!(timeout.provider(), "openai");
    }

    #[test]
    fn test_error_messages_name_the_provider() {
        let err = ProviderError::schema("ollama", "missing field `message`");
        assert_eq!(
            err.to_string(),
            "ollama returned an unrecognized response: missing field `message`"
        );
    }
}
