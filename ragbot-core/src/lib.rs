//! ragbot-core - Retrieval-augmented chatbot engine
//!
//! Provides the components behind the ragbot service:
//! - Model provider clients (OpenAI-compatible, Ollama)
//! - RAG pipeline: loading, chunking, embedding, vector index, retrieval
//! - Conversation sessions with history
//! - Configuration management
//! - HTTP API
//!
//! ## Primary API
//!
//! Build a [`RagEngine`] from a [`Config`], then either ask questions through
//! a [`ConversationSession`] or expose everything over HTTP with [`Server`].

// Public modules
pub mod chat;
pub mod config;
pub mod patterns;
pub mod provider;
pub mod rag;
pub mod server;

// Public exports
pub use chat::{ChatAnswer, ChatTurn, ConversationHistory, ConversationSession, SessionState, Source};
pub use config::{Config, ConfigError};
pub use rag::{IngestMode, IngestReport, RagEngine, RagError};
pub use server::Server;

// Provider exports
pub use provider::{ChatRequest, ChatResponse, EmbedRequest, EmbedResponse, Message, Provider, ProviderError};
