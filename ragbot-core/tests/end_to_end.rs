//! Whole-pipeline scenarios with a scripted in-memory provider.

mod common;

use common::{config_in, write_documents, ScriptedProvider};
use ragbot_core::chat::{SessionState, NOT_INITIALIZED_ANSWER};
use ragbot_core::{IngestMode, ProviderError, RagEngine, RagError};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn ingested_engine(root: &Path, provider: Arc<ScriptedProvider>) -> RagEngine {
    let config = config_in(root);
    write_documents(&config, &[("a_sky.txt", "The sky is blue."), ("b_grass.txt", "Grass is green.")]);
    let engine = RagEngine::new(config, provider).await.unwrap();
    engine.ingest(IngestMode::Replace).await.unwrap();
    engine
}

#[tokio::test]
async fn answers_from_the_most_relevant_document() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let engine = ingested_engine(root.path(), Arc::new(ScriptedProvider::default())).await;

    let ranked = engine.search("What color is the sky?", 3).await.unwrap();
    assert_eq!(ranked[0].chunk.content, "The sky is blue.");
    assert!(ranked[0].score > ranked[1].score);

    let session = engine.session().await;
    assert_eq!(session.state(), SessionState::Ready);

    let reply = session.ask("What color is the sky?").await;
    assert!(reply.answer.contains("blue"), "answer: {}", reply.answer);
    assert_eq!(reply.sources[0].content, "The sky is blue.");
    assert_eq!(session.history().await.len(), 2);
}

#[tokio::test]
async fn answers_in_band_without_an_index() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::default());
    let engine = RagEngine::new(config_in(root.path()), provider.clone()).await.unwrap();

    let session = engine.session().await;
    assert_eq!(session.state(), SessionState::Uninitialized);

    let reply = session.ask("What color is the sky?").await;
    assert_eq!(reply.answer, NOT_INITIALIZED_ANSWER);
    assert!(reply.sources.is_empty());
    assert!(provider.prompts().is_empty());
    assert!(matches!(engine.search("sky", 3).await, Err(RagError::IndexUnavailable)));
}

#[tokio::test]
async fn embedding_timeout_becomes_a_displayable_answer() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::default());
    let engine = ingested_engine(root.path(), provider.clone()).await;
    let session = engine.session().await;

    provider.fail_embeddings.store(true, Ordering::SeqCst);
    let reply = session.ask("What color is the sky?").await;

    assert!(reply.answer.starts_with("Error processing your question:"), "answer: {}", reply.answer);
    assert!(reply.sources.is_empty());
    assert!(session.history().await.is_empty());
    assert!(matches!(
        engine.search("sky", 3).await,
        Err(RagError::Provider(ProviderError::Timeout { .. }))
    ));
}

#[tokio::test]
async fn clearing_twice_is_the_same_as_once() {
    let root = tempfile::tempdir().unwrap();
    let engine = ingested_engine(root.path(), Arc::new(ScriptedProvider::default())).await;
    let session = engine.session().await;

    session.ask("What color is the sky?").await;
    session.clear().await;
    let once = session.history().await;
    session.clear().await;

    assert!(once.is_empty());
    assert_eq!(session.history().await, once);
    assert!(engine.store().is_ready().await);
}

#[tokio::test]
async fn search_bounds() {
    let root = tempfile::tempdir().unwrap();
    let config = config_in(root.path());
    write_documents(
        &config,
        &[("a.txt", "The sky is blue."), ("b.txt", "Grass is green."), ("c.txt", "What is the color?")],
    );
    let engine = RagEngine::new(config, Arc::new(ScriptedProvider::default())).await.unwrap();
    engine.ingest(IngestMode::Replace).await.unwrap();

    assert!(matches!(engine.search("sky", 0).await, Err(RagError::InvalidArgument(_))));
    assert_eq!(engine.search("sky", 100).await.unwrap().len(), 3);
}

#[tokio::test]
async fn index_survives_a_restart() {
    let root = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::default());
    let engine = ingested_engine(root.path(), provider.clone()).await;
    let before = engine.search("What color is the grass?", 2).await.unwrap();
    drop(engine);

    let restarted = RagEngine::new(config_in(root.path()), provider).await.unwrap();
    assert_eq!(restarted.session().await.state(), SessionState::Ready);
    assert_eq!(restarted.search("What color is the grass?", 2).await.unwrap(), before);
}

#[tokio::test]
async fn corrupt_index_starts_uninitialized_until_ingest() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let config = config_in(root.path());
    std::fs::create_dir_all(config.storage.index_path.parent().unwrap()).unwrap();
    std::fs::write(&config.storage.index_path, b"RBIX but not really").unwrap();
    write_documents(&config, &[("sky.txt", "The sky is blue.")]);

    let engine = RagEngine::new(config, Arc::new(ScriptedProvider::default())).await.unwrap();
    let stale = engine.session().await;
    assert_eq!(stale.state(), SessionState::Uninitialized);

    let report = engine.ingest(IngestMode::Replace).await.unwrap();
    assert_eq!(report.indexed, 1);

    assert_eq!(stale.state(), SessionState::Uninitialized);
    assert_eq!(engine.session().await.state(), SessionState::Ready);
}

#[tokio::test]
async fn cancelled_question_leaves_history_untouched() {
    let root = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::default());
    let engine = ingested_engine(root.path(), provider.clone()).await;
    let session = engine.session().await;
    provider.slow_chat.store(true, Ordering::SeqCst);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    assert!(session.ask_cancellable("What color is the sky?", &cancel).await.is_none());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(session.history().await.is_empty());
}

#[tokio::test]
async fn follow_up_questions_are_condensed() {
    let root = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::default());
    let mut config = config_in(root.path());
    config.rag.condense_questions = true;
    write_documents(&config, &[("a_sky.txt", "The sky is blue."), ("b_grass.txt", "Grass is green.")]);
    let engine = RagEngine::new(config, provider.clone()).await.unwrap();
    engine.ingest(IngestMode::Replace).await.unwrap();
    let session = engine.session().await;

    session.ask("What color is the sky?").await;
    let reply = session.ask("And the grass?").await;

    let prompts = provider.prompts();
    assert!(prompts.iter().any(|p| p.contains("Follow Up Input: And the grass?")));
    assert_eq!(reply.sources[0].content, "Grass is green.");

    let history = session.history().await;
    assert_eq!(history.turns()[2].content, "And the grass?");
}

#[tokio::test]
async fn ingestion_can_run_on_a_spawned_task() {
    let root = tempfile::tempdir().unwrap();
    let config = config_in(root.path());
    write_documents(&config, &[("a_sky.txt", "The sky is blue.")]);
    let engine = RagEngine::new(config, Arc::new(ScriptedProvider::default())).await.unwrap();

    let worker = engine.clone();
    let report = tokio::spawn(async move { worker.ingest(IngestMode::Replace).await })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.indexed, 1);
    assert!(engine.store().is_ready().await);
}
