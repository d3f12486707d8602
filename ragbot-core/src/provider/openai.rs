//! OpenAI-compatible provider implementation.
//!
//! Talks to any server exposing `/chat/completions` and `/embeddings` in the
//! OpenAI wire format (Sarvam, OpenAI, vLLM, llama.cpp server, ...).

use super::http::{endpoint, HttpTransport};
use super::types::*;
use crate::config::ProviderConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const NAME: &str = "openai";

/// OpenAI-compatible HTTP API provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    base_url: String,
    transport: HttpTransport,
}

impl OpenAiProvider {
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
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = endpoint(&self.base_url, "chat/completions");
        let body = CompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response: CompletionResponse = self.transport.post_json(&url, &body).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::schema(NAME, "`choices` is empty"))?;

        Ok(ChatResponse {
            model: response.model.unwrap_or(request.model),
            content: choice.message.content,
        })
    }

    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse> {
        let url = endpoint(&self.base_url, "embeddings");
        let expected = request.input.len();

        let response: EmbeddingsResponse = self.transport.post_json(&url, &request).await?;
        let mut data = response.data;
        if data.len() != expected {
            return Err(ProviderError::schema(
                NAME,
                format!("{} embeddings returned for {} inputs", data.len(), expected),
            ));
        }

        // Servers may answer out of order; `index` is authoritative.
        data.sort_by_key(|item| item.index);
        if data.iter().enumerate().any(|(i, item)| item.index != i) {
            return Err(ProviderError::schema(NAME, "embedding indices do not cover the inputs"));
        }

        Ok(EmbedResponse {
            model: response.model.unwrap_or(request.model),
            embeddings: data.into_iter().map(|item| item.embedding).collect(),
        })
    }
}

// OpenAI wire types (internal)

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    model: Option<String>,
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    index: usize,
}
