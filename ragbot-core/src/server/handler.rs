use super::types::{
    AnswerResponse, HealthResponse, IngestResponse, MessageResponse, QuestionRequest, ServerError,
};
use crate::chat::ConversationSession;
use crate::rag::{IngestMode, RagEngine, RagError};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// State shared by every request.
///
/// The session is replaced wholesale after a successful ingestion, so a
/// request that already holds the old one finishes against the old index.
pub struct AppState {
    engine: RagEngine,
    session: RwLock<Arc<ConversationSession>>,
}

impl AppState {
    pub async fn new(engine: RagEngine) -> Self {
        let session = Arc::new(engine.session().await);
        Self {
            engine,
            session: RwLock::new(session),
        }
    }

    pub fn engine(&self) -> &RagEngine {
        &self.engine
    }

    pub async fn session(&self) -> Arc<ConversationSession> {
        self.session.read().await.clone()
    }
}

pub type SharedState = Arc<AppState>;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn chat(
    State(state): State<SharedState>,
    body: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ServerError> {
    let Json(request) = body.map_err(|e| {
        warn!(error = %e, "Rejected chat body");
        ServerError::Validation(format!("Invalid request body: {}", e.body_text()))
    })?;

    let question = request
        .question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ServerError::Validation("Question is required".into()))?;

    let session = state.session().await;
    let answer = session.ask(&question).await;
    Ok(Json(answer.into()))
}

pub async fn clear_history(State(state): State<SharedState>) -> Json<MessageResponse> {
    state.session().await.clear().await;
    Json(MessageResponse::new("History cleared successfully"))
}

pub async fn ingest(State(state): State<SharedState>) -> Result<Json<IngestResponse>, ServerError> {
    let report = state.engine.ingest(IngestMode::Replace).await.map_err(|e| match e {
        RagError::EmptyInput => ServerError::NoDocuments,
        other => {
            error!(error = %other, "Ingestion failed");
            ServerError::Internal(other.to_string())
        }
    })?;

    let fresh = Arc::new(state.engine.session().await);
    *state.session.write().await = fresh;
    info!(documents = report.documents, chunks = report.chunks, "Serving a fresh session");

    Ok(Json(report.into()))
}
