//! HTTP server for the chatbot.
//!
//! The server is organized into separate concerns:
//! - `types`: request and response bodies, and the error mapping
//! - `handler`: shared state and the route handlers
//!
//! Every route is served at the root and again under
//! [`ServerConfig::api_prefix`](crate::config::ServerConfig).

mod handler;
mod types;

pub use handler::{AppState, SharedState};
pub use types::{
    AnswerResponse, ErrorResponse, HealthResponse, IngestResponse, MessageResponse, QuestionRequest,
    ServerError,
};

use crate::config::{Config, ServerConfig};
use crate::rag::{RagEngine, Result as RagResult};
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Builds the application router.
pub fn build_router(state: SharedState, config: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/health/", get(handler::health))
        .route("/health", get(handler::health))
        .route("/chat/", post(handler::chat))
        .route("/chat", post(handler::chat))
        .route("/clear-history/", post(handler::clear_history))
        .route("/clear-history", post(handler::clear_history))
        .route("/ingest/", post(handler::ingest))
        .route("/ingest", post(handler::ingest));

    let prefix = config.api_prefix.trim_end_matches('/');
    let mut app = if prefix.is_empty() {
        api
    } else {
        api.clone().nest(prefix, api)
    };

    if config.cors {
        app = app.layer(CorsLayer::permissive());
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// HTTP front end over a [`RagEngine`].
pub struct Server {
    state: SharedState,
    config: ServerConfig,
}

impl Server {
    /// Creates a server for `config`, using the provider it names.
    pub async fn new(config: Config) -> RagResult<Self> {
        let server_config = config.server.clone();
        let engine = RagEngine::from_config(config).await?;
        Ok(Self::with_engine(engine, server_config).await)
    }

    pub async fn with_engine(engine: RagEngine, config: ServerConfig) -> Self {
        let state = Arc::new(AppState::new(engine).await);
        Self { state, config }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.config)
    }

    /// Binds the configured address and serves until Ctrl-C.
    pub async fn start(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.bind).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` completes, letting in-flight
    /// requests finish.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(%addr, prefix = %self.config.api_prefix, "Chatbot server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down...");
    }
}
