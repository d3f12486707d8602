//! Model provider abstraction layer.
//!
//! This module defines a common interface for the remote backends that
//! answer chat completions and produce embeddings.

mod http;
mod types;
pub mod ollama;
pub mod openai;

// Re-export common types
pub use types::{
    ChatRequest,
    ChatResponse,
    EmbedRequest,
    EmbedResponse,
    Message,
    Provider,
    ProviderError,
    Result,
};

// Re-export provider implementations
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::config::{ProviderConfig, ProviderKind};
use std::sync::Arc;

/// Builds the provider selected by `provider.kind`.
pub fn from_config(config: &ProviderConfig) -> Arc<dyn Provider> {
    match config.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config)),
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(config)),
    }
}
