//! Prompt assembly and answer generation.

use super::types::Chunk;
use crate::chat::{ConversationHistory, Role};
use crate::config::LlmConfig;
use crate::provider::{ChatRequest, Message, Provider, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Renders the grounded question-answering prompt.
///
/// Chunk contents are joined in retrieval order with a blank line between
/// them.
pub fn render_prompt(question: &str, chunks: &[Chunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful AI assistant. Use the following context to answer the user's question.\n\
         If you cannot find the answer in the context, say so politely. Don't make up information.\n\
         \n\
         Context: {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Answer:"
    )
}

/// Renders the prompt that rewrites a follow-up into a standalone question.
pub fn render_condense_prompt(question: &str, history: &ConversationHistory) -> String {
    let chat_history = history
        .turns()
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                Role::User => "Human",
                Role::Assistant => "AI",
            };
            format!("{speaker}: {}", turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question.\n\
         \n\
         Chat History:\n\
         {chat_history}\n\
         Follow Up Input: {question}\n\
         Standalone question:"
    )
}

/// Text shown to the user in place of an answer when a step fails.
pub fn error_answer(error: impl std::fmt::Display) -> String {
    format!("Error processing your question: {error}")
}

/// Sends prompts to the chat model.
#[derive(Clone)]
pub struct AnswerGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn Provider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Answers `question` from `chunks`.
    ///
    /// Always returns displayable text: a provider failure is turned into an
    /// error message rather than propagated.
    pub async fn generate(&self, question: &str, chunks: &[Chunk], history: &ConversationHistory) -> String {
        debug!(chunks = chunks.len(), history = history.len(), "Generating answer");
        match self.try_generate(question, chunks).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, provider = e.provider(), "Answer generation failed");
                error_answer(e)
            }
        }
    }

    /// Like [`generate`](Self::generate) but hands the provider error back.
    pub async fn try_generate(&self, question: &str, chunks: &[Chunk]) -> Result<String> {
        self.complete(render_prompt(question, chunks)).await
    }

    /// Rewrites a follow-up into a standalone question using `history`.
    ///
    /// Returns `question` unchanged when there is no history, or when the
    /// model fails or answers with nothing.
    pub async fn condense_question(&self, question: &str, history: &ConversationHistory) -> String {
        if history.is_empty() {
            return question.to_string();
        }

        match self.complete(render_condense_prompt(question, history)).await {
            Ok(standalone) if !standalone.trim().is_empty() => {
                let standalone = standalone.trim().to_string();
                debug!(original = question, standalone = %standalone, "Condensed question");
                standalone
            }
            Ok(_) => question.to_string(),
            Err(e) => {
                warn!(error = %e, "Question condensation failed, using the question as asked");
                question.to_string()
            }
        }
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let request = ChatRequest::new(&self.model, vec![Message::user(prompt)])
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        Ok(self.provider.chat(request).await?.content)
    }
}
