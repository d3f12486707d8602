use crate::chat::{ChatAnswer, Source};
use crate::rag::IngestReport;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of `POST /chat/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionRequest {
    #[serde(default)]
    pub question: Option<String>,
}

/// Body returned by `POST /chat/`.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub source_documents: Vec<Source>,
}

impl From<ChatAnswer> for AnswerResponse {
    fn from(answer: ChatAnswer) -> Self {
        Self {
            answer: answer.answer,
            source_documents: answer.sources,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub message: String,
    pub documents: usize,
    pub chunks: usize,
}

impl From<IngestReport> for IngestResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            message: "Documents ingested successfully".to_string(),
            documents: report.documents,
            chunks: report.chunks,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors a handler reports to the client.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Rejected request input.
    #[error("{0}")]
    Validation(String),

    #[error("No documents found to ingest")]
    NoDocuments,

    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) | ServerError::NoDocuments => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
