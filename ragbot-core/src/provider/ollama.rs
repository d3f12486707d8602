//! Ollama provider implementation.
//!
//! This module provides an Ollama HTTP API client that implements the Provider trait.

use super::http::{endpoint, HttpTransport};
use super::types::*;
use crate::config::ProviderConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const NAME: &str = "ollama";

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    transport: HttpTransport,
}

impl OllamaProvider {
    /// Creates a new Ollama provider with the specified config.
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            transport: HttpTransport::new(
                NAME,
                config.api_key.clone(),
                config.timeout(),
                config.max_retries,
            ),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = endpoint(&self.base_url, "api/chat");

        let mut options = HashMap::new();
        options.insert("temperature".to_string(), serde_json::json!(request.temperature));
        if let Some(max_tokens) = request.max_tokens {
            options.insert("num_predict".to_string(), serde_json::json!(max_tokens));
        }

        let ollama_request = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            options,
            stream: false,
        };

        let response: OllamaChatResponse = self.transport.post_json(&url, &ollama_request).await?;

        Ok(ChatResponse {
            model: response.model,
            content: response.message.content,
        })
    }

    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse> {
        let url = endpoint(&self.base_url, "api/embed");
        let expected = request.input.len();

        let response: OllamaEmbedResponse = self.transport.post_json(&url, &request).await?;
        if response.embeddings.len() != expected {
            return Err(ProviderError::schema(
                NAME,
                format!(
                    "{} embeddings returned for {} inputs",
                    response.embeddings.len(),
                    expected
                ),
            ));
        }

        Ok(EmbedResponse {
            model: response.model,
            embeddings: response.embeddings,
        })
    }
}

// Ollama-specific request/response types (internal)

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    options: HashMap<String, serde_json::Value>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    model: String,
    embeddings: Vec<Vec<f32>>,
}
