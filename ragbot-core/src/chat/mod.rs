//! Conversations over the indexed documents.

mod history;
mod session;

pub use history::{ChatTurn, ConversationHistory, Role};
pub use session::{ChatAnswer, ConversationSession, SessionState, Source, NOT_INITIALIZED_ANSWER};
