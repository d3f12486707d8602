//! End-to-end question answering for one conversation.
//!
//! A [`ConversationSession`] ties a [`Retriever`] to an [`AnswerGenerator`]
//! and keeps the conversation's history. Sessions are built by
//! [`RagEngine::session`](crate::rag::RagEngine::session) and owned by
//! whoever serves the conversation; there is no process-wide instance.
//!
//! # States
//!
//! ```text
//! Uninitialized ──(ingest, new session)──▶ Ready
//! ```
//!
//! A session created before any index exists stays `Uninitialized` and
//! answers every question with [`NOT_INITIALIZED_ANSWER`]. Ingestion does not
//! revive it; the caller replaces it with a fresh session.

use super::history::ConversationHistory;
use crate::rag::generator::error_answer;
use crate::rag::types::{Metadata, RetrievalResult};
use crate::rag::{AnswerGenerator, RagError, Retriever};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Answer given while no index is loaded.
pub const NOT_INITIALIZED_ANSWER: &str =
    "Sorry, the chatbot is not initialized. Please ensure the vector store is created.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Ready,
}

/// A retrieved passage cited in an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub content: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
}

impl ChatAnswer {
    fn without_sources(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }
}

pub struct ConversationSession {
    retriever: Option<Retriever>,
    generator: AnswerGenerator,
    history: Mutex<ConversationHistory>,
    top_k: usize,
    condense_questions: bool,
}

impl ConversationSession {
    /// A session answering from `retriever`.
    pub fn ready(retriever: Retriever, generator: AnswerGenerator, top_k: usize) -> Self {
        Self {
            retriever: Some(retriever),
            generator,
            history: Mutex::new(ConversationHistory::new()),
            top_k: top_k.max(1),
            condense_questions: false,
        }
    }

    /// A session with no index behind it.
    pub fn uninitialized(generator: AnswerGenerator, top_k: usize) -> Self {
        Self {
            retriever: None,
            generator,
            history: Mutex::new(ConversationHistory::new()),
            top_k: top_k.max(1),
            condense_questions: false,
        }
    }

    /// Rewrite follow-up questions against the history before retrieval.
    pub fn with_condensed_questions(mut self, enabled: bool) -> Self {
        self.condense_questions = enabled;
        self
    }

    pub fn state(&self) -> SessionState {
        if self.retriever.is_some() {
            SessionState::Ready
        } else {
            SessionState::Uninitialized
        }
    }

    /// Answers `question` and records the exchange.
    ///
    /// Never fails: a missing index yields [`NOT_INITIALIZED_ANSWER`] and a
    /// failed remote call yields an error message as the answer. Only
    /// answers backed by retrieval are added to the history.
    pub async fn ask(&self, question: &str) -> ChatAnswer {
        let Some(retriever) = &self.retriever else {
            debug!("Question asked before any index was loaded");
            return ChatAnswer::without_sources(NOT_INITIALIZED_ANSWER);
        };

        let history = self.history.lock().await.clone();
        let query = if self.condense_questions {
            self.generator.condense_question(question, &history).await
        } else {
            question.to_string()
        };

        let results = match retriever.retrieve(&query, self.top_k).await {
            Ok(results) => results,
            Err(RagError::IndexUnavailable) => {
                return ChatAnswer::without_sources(NOT_INITIALIZED_ANSWER);
            }
            Err(e) => {
                warn!(error = %e, "Retrieval failed");
                return ChatAnswer::without_sources(error_answer(e));
            }
        };

        let chunks: Vec<_> = results.iter().map(|r| r.chunk.clone()).collect();
        let answer = self.generator.generate(&query, &chunks, &history).await;

        self.history.lock().await.record_exchange(question, answer.clone());
        info!(sources = results.len(), "Answered question");

        ChatAnswer {
            answer,
            sources: sources(results),
        }
    }

    /// Like [`ask`](Self::ask), but gives up when `cancel` fires.
    ///
    /// Returns `None` when cancelled. Pending remote calls are dropped and
    /// the history is left as it was.
    pub async fn ask_cancellable(&self, question: &str, cancel: &CancellationToken) -> Option<ChatAnswer> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Question cancelled");
                None
            }
            answer = self.ask(question) => Some(answer),
        }
    }

    /// Forgets the conversation. The index is not touched.
    pub async fn clear(&self) {
        self.history.lock().await.clear();
    }

    pub async fn history(&self) -> ConversationHistory {
        self.history.lock().await.clone()
    }
}

fn sources(results: RetrievalResult) -> Vec<Source> {
    results
        .into_iter()
        .map(|r| Source {
            content: r.chunk.content,
            metadata: r.chunk.metadata,
        })
        .collect()
}
