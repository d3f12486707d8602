//! ragbot - Retrieval-augmented chatbot service
//!
//! This is the convenience wrapper crate that re-exports the engine from
//! `ragbot-core`.
//!
//! # Quick Start
//!
//! ```no_run
//! use ragbot::prelude::*;
//!
//! # async fn example() -> Result<(), RagError> {
//! let engine = RagEngine::from_config(Config::load_or_default().with_env_overrides()).await?;
//! engine.ingest(IngestMode::Replace).await?;
//!
//! let session = engine.session().await;
//! let reply = session.ask("What color is the sky?").await;
//! println!("{}", reply.answer);
//! # Ok(())
//! # }
//! ```

// Re-export core
pub use ragbot_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use ragbot_core::chat::{ChatAnswer, ConversationSession, SessionState, Source};
    pub use ragbot_core::config::Config;
    pub use ragbot_core::provider::Provider;
    pub use ragbot_core::rag::{IngestMode, IngestReport, RagEngine, RagError};
    pub use ragbot_core::server::Server;
}
