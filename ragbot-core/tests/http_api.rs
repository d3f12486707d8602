//! The HTTP surface, driven through the router without a socket.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{config_in, write_sky_and_grass, ScriptedProvider};
use http_body_util::BodyExt;
use ragbot_core::chat::NOT_INITIALIZED_ANSWER;
use ragbot_core::config::Config;
use ragbot_core::{RagEngine, Server};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn router(config: Config) -> Router {
    let server_config = config.server.clone();
    let engine = RagEngine::new(config, Arc::new(ScriptedProvider::default())).await.unwrap();
    Server::with_engine(engine, server_config).await.router()
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = request
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_is_served_at_root_and_prefix() {
    let root = tempfile::tempdir().unwrap();
    let app = router(config_in(root.path())).await;

    for uri in ["/health/", "/api/health/"] {
        let (status, body) = send(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }
}

#[tokio::test]
async fn chat_rejects_missing_or_empty_question() {
    let root = tempfile::tempdir().unwrap();
    let app = router(config_in(root.path())).await;

    for body in [r#"{}"#, r#"{"question": ""}"#, r#"{"question": "   "}"#] {
        let (status, value) = send(&app, "POST", "/chat/", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(value, json!({"error": "Question is required"}));
    }

    let (status, value) = send(&app, "POST", "/chat/", Some("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(value["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn chat_before_ingest_answers_in_band() {
    let root = tempfile::tempdir().unwrap();
    let app = router(config_in(root.path())).await;

    let (status, body) = send(&app, "POST", "/chat/", Some(r#"{"question": "What color is the sky?"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], NOT_INITIALIZED_ANSWER);
    assert_eq!(body["source_documents"], json!([]));
}

#[tokio::test]
async fn ingest_with_no_documents_is_bad_request() {
    let root = tempfile::tempdir().unwrap();
    let app = router(config_in(root.path())).await;

    let (status, body) = send(&app, "POST", "/ingest/", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No documents found to ingest"}));
}

#[tokio::test]
async fn ingest_then_chat_with_sources() {
    let root = tempfile::tempdir().unwrap();
    let config = config_in(root.path());
    write_sky_and_grass(&config);
    let app = router(config).await;

    let (status, body) = send(&app, "POST", "/api/ingest/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Documents ingested successfully");
    assert_eq!(body["documents"], 2);
    assert_eq!(body["chunks"], 2);

    let (status, body) = send(&app, "POST", "/api/chat/", Some(r#"{"question": "What color is the sky?"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["answer"].as_str().unwrap().contains("blue"));

    let sources = body["source_documents"].as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["content"], "The sky is blue.");
    assert!(sources[0]["metadata"]["source"].as_str().unwrap().ends_with("a_sky.txt"));
}

#[tokio::test]
async fn clear_history_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let app = router(config_in(root.path())).await;

    for _ in 0..2 {
        let (status, body) = send(&app, "POST", "/clear-history/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "History cleared successfully"}));
    }
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let app = router(config_in(root.path())).await;

    let (status, _) = send(&app, "GET", "/nope/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
